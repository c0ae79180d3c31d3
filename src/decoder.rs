// 该文件是 Danqing （丹青） 项目的一部分。
// src/decoder.rs - 原始输出解码
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

use thiserror::Error;
use tracing::debug;

use crate::tensor::{BOX_PREFIX, OutputTensor};

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("类别数量不匹配: 张量声明 {declared} 个类别, 类别名称表只有 {available} 项")]
  ClassCountMismatch { declared: usize, available: usize },
}

/// 轴对齐边界框, 中心点表示, 图像像素坐标。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn left(&self) -> f32 {
    self.center_x - self.width / 2.0
  }

  pub fn top(&self) -> f32 {
    self.center_y - self.height / 2.0
  }

  pub fn right(&self) -> f32 {
    self.center_x + self.width / 2.0
  }

  pub fn bottom(&self) -> f32 {
    self.center_y + self.height / 2.0
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  /// 类别编号
  pub class_id: usize,
  /// 该行描述一个物体的概率
  pub objectness: f32,
  /// 最可能类别的得分
  pub class_probability: f32,
  /// 边界框 (像素坐标)
  pub bbox: BoundingBox,
}

/// 把原始输出张量解码为候选检测。
/// objectness 与类别概率都必须严格大于阈值, 恰好等于阈值的行被丢弃。
/// 张量声明的类别数超过类别名称表时整体报错, 不产生任何候选。
pub fn decode(
  outputs: &[OutputTensor],
  image_width: u32,
  image_height: u32,
  confidence_threshold: f32,
  num_classes: usize,
) -> Result<Vec<Detection>, DecodeError> {
  let (w, h) = (image_width as f32, image_height as f32);
  let mut candidates = Vec::new();

  for output in outputs {
    // 零行张量不参与结构检查, 也不产生候选
    if output.rows() == 0 {
      continue;
    }
    if output.num_classes() > num_classes {
      return Err(DecodeError::ClassCountMismatch {
        declared: output.num_classes(),
        available: num_classes,
      });
    }

    for row in 0..output.rows() {
      let objectness = output.at(row, 4);
      if objectness <= confidence_threshold {
        continue;
      }

      // 在类别得分列中找最大者, 并列时取靠前的列
      let mut class_id = 0usize;
      let mut class_probability = output.at(row, BOX_PREFIX);
      for class in 1..output.num_classes() {
        let score = output.at(row, BOX_PREFIX + class);
        if score > class_probability {
          class_probability = score;
          class_id = class;
        }
      }

      if class_probability <= confidence_threshold {
        continue;
      }

      candidates.push(Detection {
        class_id,
        objectness,
        class_probability,
        bbox: BoundingBox {
          center_x: output.at(row, 0) * w,
          center_y: output.at(row, 1) * h,
          width: output.at(row, 2) * w,
          height: output.at(row, 3) * h,
        },
      });
    }
  }

  debug!("解码得到 {} 个候选检测", candidates.len());
  Ok(candidates)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tensor(rows: Vec<Vec<f32>>) -> OutputTensor {
    OutputTensor::from_rows(rows).unwrap()
  }

  fn sorted(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| {
      (a.class_id, a.bbox.center_x.to_bits()).cmp(&(b.class_id, b.bbox.center_x.to_bits()))
    });
    detections
  }

  #[test]
  fn one_row_decodes_to_expected_detection() {
    let outputs = [tensor(vec![vec![0.5, 0.5, 0.25, 0.25, 0.9, 0.1, 0.95, 0.2]])];
    let detections = decode(&outputs, 200, 100, 0.5, 3).unwrap();

    assert_eq!(detections.len(), 1);
    let det = &detections[0];
    assert_eq!(det.class_id, 1);
    assert_eq!(det.objectness, 0.9);
    assert_eq!(det.class_probability, 0.95);
    assert_eq!(det.bbox.center_x, 100.0);
    assert_eq!(det.bbox.center_y, 50.0);
    assert_eq!(det.bbox.width, 50.0);
    assert_eq!(det.bbox.height, 25.0);
  }

  #[test]
  fn objectness_equal_to_threshold_is_rejected() {
    let outputs = [tensor(vec![vec![0.5, 0.5, 0.4, 0.4, 0.5, 0.1, 0.95, 0.2]])];
    let detections = decode(&outputs, 100, 100, 0.5, 3).unwrap();
    assert!(detections.is_empty());
  }

  #[test]
  fn class_probability_equal_to_threshold_is_rejected() {
    let outputs = [tensor(vec![vec![0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.5, 0.2]])];
    let detections = decode(&outputs, 100, 100, 0.5, 3).unwrap();
    assert!(detections.is_empty());
  }

  #[test]
  fn values_just_above_threshold_are_accepted() {
    let outputs = [tensor(vec![vec![
      0.5, 0.5, 0.4, 0.4, 0.500001, 0.1, 0.500001, 0.2,
    ]])];
    let detections = decode(&outputs, 100, 100, 0.5, 3).unwrap();
    assert_eq!(detections.len(), 1);
  }

  #[test]
  fn both_gates_must_pass_independently() {
    // 高 objectness 低类别概率, 以及反过来, 都应被丢弃
    let outputs = [tensor(vec![
      vec![0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.3, 0.2],
      vec![0.5, 0.5, 0.4, 0.4, 0.3, 0.1, 0.9, 0.2],
    ])];
    let detections = decode(&outputs, 100, 100, 0.5, 3).unwrap();
    assert!(detections.is_empty());
  }

  #[test]
  fn zero_row_tensor_yields_no_candidates() {
    let outputs = [tensor(Vec::new())];
    let detections = decode(&outputs, 100, 100, 0.5, 3).unwrap();
    assert!(detections.is_empty());
  }

  #[test]
  fn tensor_order_does_not_change_candidate_set() {
    let a = tensor(vec![vec![0.2, 0.2, 0.1, 0.1, 0.9, 0.95, 0.1, 0.1]]);
    let b = tensor(vec![
      vec![0.6, 0.6, 0.2, 0.2, 0.8, 0.1, 0.85, 0.1],
      vec![0.8, 0.8, 0.1, 0.1, 0.7, 0.1, 0.1, 0.9],
    ]);

    let forward = decode(&[a.clone(), b.clone()], 100, 100, 0.5, 3).unwrap();
    let backward = decode(&[b, a], 100, 100, 0.5, 3).unwrap();

    assert_eq!(sorted(forward), sorted(backward));
  }

  #[test]
  fn argmax_tie_takes_first_class() {
    let outputs = [tensor(vec![vec![0.5, 0.5, 0.4, 0.4, 0.9, 0.8, 0.8, 0.2]])];
    let detections = decode(&outputs, 100, 100, 0.5, 3).unwrap();
    assert_eq!(detections[0].class_id, 0);
  }

  #[test]
  fn declared_class_count_beyond_names_aborts() {
    // 8 列 = 3 个类别得分, 名称表只有 2 项
    let outputs = [tensor(vec![vec![0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.95, 0.2]])];
    let result = decode(&outputs, 100, 100, 0.5, 2);
    assert!(matches!(
      result,
      Err(DecodeError::ClassCountMismatch {
        declared: 3,
        available: 2
      })
    ));
  }
}
