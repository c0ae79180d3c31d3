// 该文件是 Danqing （丹青） 项目的一部分。
// src/classes.rs - 类别名称表
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

use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClassNamesError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别名称文件为空")]
  Empty,
}

/// 类别名称表: 每行一个类别名, 行号即类别编号。
#[derive(Debug, Clone)]
pub struct ClassNames {
  names: Vec<String>,
}

impl ClassNames {
  pub fn from_file(path: &Path) -> Result<Self, ClassNamesError> {
    let content = std::fs::read_to_string(path)?;
    let names: Vec<String> = content
      .lines()
      .map(|line| line.trim_end().to_string())
      .collect();

    if names.is_empty() {
      return Err(ClassNamesError::Empty);
    }

    debug!("类别名称文件共 {} 项", names.len());
    Ok(Self { names })
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(|name| name.as_str())
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl From<Vec<String>> for ClassNames {
  fn from(names: Vec<String>) -> Self {
    Self { names }
  }
}

impl From<&[&str]> for ClassNames {
  fn from(names: &[&str]) -> Self {
    Self {
      names: names.iter().map(|name| name.to_string()).collect(),
    }
  }
}
