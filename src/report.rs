// 该文件是 Danqing （丹青） 项目的一部分。
// src/report.rs - 检测结果报告
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

use chrono::Utc;
use serde_json::json;

use crate::classes::ClassNames;
use crate::decoder::Detection;

/// 把最终检测列表写成 JSON 报告, 与像素渲染相互独立。
pub fn save_report(
  path: &Path,
  detections: &[Detection],
  class_names: &ClassNames,
) -> Result<(), std::io::Error> {
  let items: Vec<_> = detections
    .iter()
    .map(|det| {
      json!({
        "class_id": det.class_id,
        "class_name": class_names.get(det.class_id),
        "objectness": det.objectness,
        "probability": det.class_probability,
        "box": {
          "center_x": det.bbox.center_x,
          "center_y": det.bbox.center_y,
          "width": det.bbox.width,
          "height": det.bbox.height,
        },
      })
    })
    .collect();

  let report = json!({
    "generated_at": Utc::now().to_rfc3339(),
    "detections": items,
  });

  let content = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
  std::fs::write(path, content)
}
