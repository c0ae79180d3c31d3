// 该文件是 Danqing （丹青） 项目的一部分。
// src/engine.rs - 推理引擎边界
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::tensor::{Blob, OutputTensor, TensorError};

/// 默认推理输入宽度
pub const DEFAULT_INPUT_WIDTH: u32 = 416;
/// 默认推理输入高度
pub const DEFAULT_INPUT_HEIGHT: u32 = 416;

/// 推理引擎边界: 输入张量进, 每个检测头一个原始输出张量出。
/// 前向计算本身不在本仓库范围内。
pub trait Engine {
  type Error;

  fn input_width(&self) -> u32;

  fn input_height(&self) -> u32;

  /// 执行一次前向计算
  fn forward(&self, blob: &Blob) -> Result<Vec<OutputTensor>, Self::Error>;
}

/// 占位引擎: 不执行真实推理, 返回空输出。
/// 用于在没有推理运行时的环境里走通整条流水线。
#[derive(Debug, Default)]
pub struct StubEngine;

impl StubEngine {
  pub fn new() -> Self {
    Self
  }
}

impl Engine for StubEngine {
  type Error = std::convert::Infallible;

  fn input_width(&self) -> u32 {
    DEFAULT_INPUT_WIDTH
  }

  fn input_height(&self) -> u32 {
    DEFAULT_INPUT_HEIGHT
  }

  fn forward(&self, _blob: &Blob) -> Result<Vec<OutputTensor>, Self::Error> {
    warn!("占位引擎不执行真实推理, 返回空输出");
    Ok(Vec::new())
  }
}

#[derive(Error, Debug)]
pub enum TensorFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
}

/// 从文件读取外部推理引擎转储的原始输出张量。
/// 每个文件对应一个检测头, 内容是 JSON 行向量:
/// [[cx, cy, w, h, objectness, 类别得分...], ...]
#[derive(Debug)]
pub struct TensorFileEngine {
  paths: Vec<PathBuf>,
}

impl TensorFileEngine {
  pub fn new(paths: Vec<PathBuf>) -> Self {
    Self { paths }
  }
}

impl Engine for TensorFileEngine {
  type Error = TensorFileError;

  fn input_width(&self) -> u32 {
    DEFAULT_INPUT_WIDTH
  }

  fn input_height(&self) -> u32 {
    DEFAULT_INPUT_HEIGHT
  }

  fn forward(&self, _blob: &Blob) -> Result<Vec<OutputTensor>, Self::Error> {
    let mut outputs = Vec::with_capacity(self.paths.len());
    for path in &self.paths {
      let content = std::fs::read_to_string(path)?;
      let rows: Vec<Vec<f32>> = serde_json::from_str(&content)?;
      debug!("读取张量文件 {}: {} 行", path.display(), rows.len());
      outputs.push(OutputTensor::from_rows(rows)?);
    }
    Ok(outputs)
  }
}
