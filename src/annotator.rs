// 该文件是 Danqing （丹青） 项目的一部分。
// src/annotator.rs - 检测结果标注
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

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::warn;

use crate::classes::ClassNames;
use crate::decoder::Detection;
use crate::palette::Palette;

/// 标签字体大小
const LABEL_FONT_SIZE: f32 = 16.0;
/// 边框线宽 (像素)
const BOX_THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum AnnotateError {
  #[error("类别编号 {class_id} 超出范围: 共 {available} 项")]
  InvalidClassIndex { class_id: usize, available: usize },
}

/// 标注器: 在图像缓冲上就地绘制检测框与标签。
pub struct Annotator {
  font: FontArc,
  font_scale: PxScale,
}

impl Default for Annotator {
  fn default() -> Self {
    Self::new()
  }
}

impl Annotator {
  pub fn new() -> Self {
    // 使用内置的默认字体数据
    let font_data = include_bytes!("../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载内置字体");

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  /// 绘制全部检测结果。零个检测时不触碰图像缓冲。
  pub fn annotate(
    &self,
    image: &mut RgbImage,
    detections: &[Detection],
    palette: &Palette,
    class_names: &ClassNames,
  ) -> Result<(), AnnotateError> {
    for detection in detections {
      self.draw_detection(image, detection, palette, class_names)?;
    }
    Ok(())
  }

  fn draw_detection(
    &self,
    image: &mut RgbImage,
    detection: &Detection,
    palette: &Palette,
    class_names: &ClassNames,
  ) -> Result<(), AnnotateError> {
    // 先解析颜色与名称, 越界时在绘制任何像素之前返回错误
    let color = palette
      .color(detection.class_id)
      .ok_or(AnnotateError::InvalidClassIndex {
        class_id: detection.class_id,
        available: palette.len(),
      })?;
    let name = class_names
      .get(detection.class_id)
      .ok_or(AnnotateError::InvalidClassIndex {
        class_id: detection.class_id,
        available: class_names.len(),
      })?;

    let bbox = &detection.bbox;
    // 只钳制左边界, 避免标签跑出画布左侧; 右侧与上下的越界部分由绘制原语裁剪
    let x1 = bbox.left().max(0.0).floor() as i32;
    let y1 = bbox.top().floor() as i32;
    let x2 = bbox.right().ceil() as i32;
    let y2 = bbox.bottom().ceil() as i32;

    let box_width = (x2 - x1).max(0) as u32;
    let box_height = (y2 - y1).max(0) as u32;

    if box_width > 0 && box_height > 0 {
      // 嵌套空心矩形, 得到 2 像素线宽
      for t in 0..BOX_THICKNESS {
        let width = box_width.saturating_sub(2 * t as u32);
        let height = box_height.saturating_sub(2 * t as u32);
        if width == 0 || height == 0 {
          break;
        }
        draw_hollow_rect_mut(image, Rect::at(x1 + t, y1 + t).of_size(width, height), color);
      }
    }

    let label = format!("{} {:.2}%", name, detection.class_probability * 100.0);
    let (text_width, text_height) = text_size(self.font_scale, &self.font, &label);
    if text_width == 0 || text_height == 0 {
      // 标签量不出尺寸时跳过该标签, 边框照常保留
      warn!("标签 {:?} 无法测量, 跳过绘制", label);
      return Ok(());
    }

    let font = &self.font;
    let baseline = font.as_scaled(self.font_scale).descent().abs().ceil() as u32;

    // 标签背景紧贴边框上沿, 高度为文本高度加基线
    let label_height = text_height + baseline;
    let label_y = y1 - label_height as i32;
    draw_filled_rect_mut(
      image,
      Rect::at(x1, label_y).of_size(text_width, label_height),
      color,
    );

    let text_color = Palette::contrast_color(color);
    draw_text_mut(
      image,
      text_color,
      x1,
      label_y,
      self.font_scale,
      &self.font,
      &label,
    );

    Ok(())
  }
}
