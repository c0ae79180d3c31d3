// 该文件是 Danqing （丹青） 项目的一部分。
// src/suppressor.rs - 非极大值抑制
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

use tracing::debug;

use crate::decoder::{BoundingBox, Detection};

/// 计算两个边界框的交并比
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
  let x1 = a.left().max(b.left());
  let y1 = a.top().max(b.top());
  let x2 = a.right().min(b.right());
  let y2 = a.bottom().min(b.bottom());

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

/// 贪心非极大值抑制。
/// 抑制跨类别进行: 不同类别的框重叠足够大时同样互相抑制。
/// 交并比恰好等于阈值时, 得分较低的框同样被抑制。
pub fn suppress(mut candidates: Vec<Detection>, nms_threshold: f32) -> Vec<Detection> {
  let total = candidates.len();
  candidates.sort_by(|a, b| {
    b.objectness
      .partial_cmp(&a.objectness)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept = Vec::new();
  while !candidates.is_empty() {
    let best = candidates.remove(0);
    candidates.retain(|det| iou(&best.bbox, &det.bbox) < nms_threshold);
    kept.push(best);
  }

  debug!("非极大值抑制: {} 个候选保留 {} 个", total, kept.len());
  kept
}
