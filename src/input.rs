// 该文件是 Danqing （丹青） 项目的一部分。
// src/input.rs - 图像输入
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

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

/// 显示宽度上限, 超出时等比缩小
pub const DISPLAY_MAX_WIDTH: u32 = 1200;
/// 显示高度上限
pub const DISPLAY_MAX_HEIGHT: u32 = 800;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从文件读取 RGB 图像
pub fn load_image(path: &Path) -> Result<RgbImage, InputError> {
  let image = ImageReader::open(path)?.decode()?;
  Ok(image.into_rgb8())
}

/// 超出显示上限的图像按两个方向缩放因子中较小的一个等比缩小,
/// 未超出时原样返回。
pub fn fit_to_display(image: RgbImage, max_width: u32, max_height: u32) -> RgbImage {
  if image.width() <= max_width && image.height() <= max_height {
    return image;
  }

  let fx = max_width as f64 / image.width() as f64;
  let fy = max_height as f64 / image.height() as f64;
  let factor = fx.min(fy);
  let width = (image.width() as f64 * factor) as u32;
  let height = (image.height() as f64 * factor) as u32;

  debug!(
    "图像 {}x{} 缩小到 {}x{}",
    image.width(),
    image.height(),
    width,
    height
  );
  image::imageops::resize(&image, width, height, FilterType::Triangle)
}
