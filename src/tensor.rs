// 该文件是 Danqing （丹青） 项目的一部分。
// src/tensor.rs - 原始输出张量与推理输入张量
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

use image::RgbImage;
use image::imageops::FilterType;
use thiserror::Error;

/// 每行前缀列数: cx, cy, w, h, objectness
pub const BOX_PREFIX: usize = 5;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("张量数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("张量每行至少需要 6 列 (前缀 5 列加至少 1 个类别得分), 实际 {0} 列")]
  TooFewColumns(usize),
  #[error("张量行宽不一致: 第 {row} 行有 {actual} 列, 期望 {expected} 列")]
  RaggedRows {
    row: usize,
    expected: usize,
    actual: usize,
  },
}

/// 单个检测头的原始输出张量。
/// 形状 rows × (5 + 类别数), 行主序, 32 位浮点;
/// 每行为 [cx, cy, w, h, objectness, 类别得分...], 坐标归一化到 [0, 1]。
#[derive(Debug, Clone)]
pub struct OutputTensor {
  rows: usize,
  cols: usize,
  data: Box<[f32]>,
}

impl OutputTensor {
  pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, TensorError> {
    if cols < BOX_PREFIX + 1 {
      return Err(TensorError::TooFewColumns(cols));
    }
    if data.len() != rows * cols {
      return Err(TensorError::LengthMismatch {
        expected: rows * cols,
        actual: data.len(),
      });
    }

    Ok(Self {
      rows,
      cols,
      data: data.into_boxed_slice(),
    })
  }

  /// 由行向量构造张量。空输入是合法的零行张量。
  pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, TensorError> {
    // 空张量没有行宽, 取最小合法宽度
    let cols = rows.first().map(|r| r.len()).unwrap_or(BOX_PREFIX + 1);

    let mut data = Vec::with_capacity(rows.len() * cols);
    for (row, values) in rows.iter().enumerate() {
      if values.len() != cols {
        return Err(TensorError::RaggedRows {
          row,
          expected: cols,
          actual: values.len(),
        });
      }
      data.extend_from_slice(values);
    }

    Self::new(rows.len(), cols, data)
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  /// 类别得分列的数量
  pub fn num_classes(&self) -> usize {
    self.cols - BOX_PREFIX
  }

  /// 读取单元格, 调用方保证行列在界内
  pub fn at(&self, row: usize, col: usize) -> f32 {
    self.data[row * self.cols + col]
  }
}

/// 推理输入张量: NCHW 平面布局, RGB 通道顺序, 像素值缩放到 [0, 1]。
#[derive(Debug, Clone)]
pub struct Blob {
  width: u32,
  height: u32,
  data: Box<[f32]>,
}

impl Blob {
  /// 把 RGB 图像缩放到推理输入尺寸并归一化。
  /// 引擎期望 RGB 通道顺序; 解码得到的图像缓冲已经是 RGB,
  /// 不需要再做 BGR 交换。
  pub fn from_image(image: &RgbImage, width: u32, height: u32) -> Self {
    let resized = image::imageops::resize(image, width, height, FilterType::Triangle);

    let plane = (width as usize) * (height as usize);
    let mut data = vec![0f32; RGB_CHANNELS * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y * width + x) as usize;
      data[idx] = pixel[0] as f32 / 255.0;
      data[plane + idx] = pixel[1] as f32 / 255.0;
      data[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }

    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }
}
