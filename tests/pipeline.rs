// 该文件是 Danqing （丹青） 项目的一部分。
// tests/pipeline.rs - 端到端流水线测试
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

use std::sync::Arc;

use image::{Rgb, RgbImage};

use danqing::classes::ClassNames;
use danqing::coordinator::{Coordinator, CoordinatorError, PipelineConfig, RunError};
use danqing::decoder::DecodeError;
use danqing::engine::Engine;
use danqing::tensor::{Blob, OutputTensor};

/// 固定输出的假引擎, 模拟外部推理引擎的前向计算
struct CannedEngine {
  outputs: Vec<OutputTensor>,
}

impl CannedEngine {
  fn from_rows(heads: Vec<Vec<Vec<f32>>>) -> Self {
    let outputs = heads
      .into_iter()
      .map(|rows| OutputTensor::from_rows(rows).unwrap())
      .collect();
    Self { outputs }
  }
}

impl Engine for CannedEngine {
  type Error = std::convert::Infallible;

  fn input_width(&self) -> u32 {
    416
  }

  fn input_height(&self) -> u32 {
    416
  }

  fn forward(&self, _blob: &Blob) -> Result<Vec<OutputTensor>, Self::Error> {
    Ok(self.outputs.clone())
  }
}

fn names() -> Arc<ClassNames> {
  Arc::new(ClassNames::from(["cat", "dog", "bird"].as_slice()))
}

fn coordinator_with(heads: Vec<Vec<Vec<f32>>>, seed: u64) -> Coordinator<CannedEngine> {
  Coordinator::new(
    Arc::new(CannedEngine::from_rows(heads)),
    names(),
    PipelineConfig::default(),
    danqing::palette::Palette::seeded(3, seed),
  )
}

fn patterned_image(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x * 3) as u8, (y * 5) as u8, (x + y) as u8])
  })
}

#[test]
fn single_row_yields_single_detection() {
  // 一行, objectness 0.9, 类别得分 [0.1, 0.95, 0.2], 阈值 0.5
  let coordinator = coordinator_with(
    vec![vec![vec![0.5, 0.5, 0.25, 0.25, 0.9, 0.1, 0.95, 0.2]]],
    11,
  );

  let outcome = coordinator
    .start_detection(RgbImage::from_pixel(200, 100, Rgb([0, 0, 0])))
    .unwrap()
    .wait()
    .unwrap();

  assert_eq!(outcome.detections.len(), 1);
  let det = &outcome.detections[0];
  assert_eq!(det.class_id, 1);
  assert_eq!(det.objectness, 0.9);
  assert_eq!(det.class_probability, 0.95);
  assert_eq!(det.bbox.center_x, 100.0);
  assert_eq!(det.bbox.center_y, 50.0);
  assert_eq!(det.bbox.width, 50.0);
  assert_eq!(det.bbox.height, 25.0);
}

#[test]
fn overlapping_candidates_collapse_to_highest_objectness() {
  // 两个交并比约 0.5 的候选, objectness 0.9 与 0.6, NMS 阈值 0.3
  let coordinator = coordinator_with(
    vec![vec![
      vec![0.4, 0.5, 0.3, 0.3, 0.9, 0.1, 0.95, 0.1],
      vec![0.5, 0.5, 0.3, 0.3, 0.6, 0.1, 0.85, 0.1],
    ]],
    11,
  );

  let outcome = coordinator
    .start_detection(RgbImage::from_pixel(100, 100, Rgb([0, 0, 0])))
    .unwrap()
    .wait()
    .unwrap();

  assert_eq!(outcome.detections.len(), 1);
  assert_eq!(outcome.detections[0].objectness, 0.9);
}

#[test]
fn nms_bypass_keeps_every_candidate() {
  let coordinator = Coordinator::new(
    Arc::new(CannedEngine::from_rows(vec![vec![
      vec![0.4, 0.5, 0.3, 0.3, 0.9, 0.1, 0.95, 0.1],
      vec![0.5, 0.5, 0.3, 0.3, 0.6, 0.1, 0.85, 0.1],
    ]])),
    names(),
    PipelineConfig::default().without_nms(),
    danqing::palette::Palette::seeded(3, 11),
  );

  let outcome = coordinator
    .start_detection(RgbImage::from_pixel(100, 100, Rgb([0, 0, 0])))
    .unwrap()
    .wait()
    .unwrap();

  assert_eq!(outcome.detections.len(), 2);
}

#[test]
fn rows_at_threshold_leave_image_bit_identical() {
  // objectness 或类别概率恰好等于阈值的行都被丢弃, 图像不被触碰
  let coordinator = coordinator_with(
    vec![vec![
      vec![0.5, 0.5, 0.2, 0.2, 0.5, 0.1, 0.9, 0.1],
      vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1, 0.5, 0.1],
    ]],
    11,
  );

  let source = patterned_image(64, 64);
  let outcome = coordinator
    .start_detection(source.clone())
    .unwrap()
    .wait()
    .unwrap();

  assert!(outcome.detections.is_empty());
  assert_eq!(outcome.image.as_raw(), source.as_raw());
}

#[test]
fn class_count_mismatch_aborts_before_rendering() {
  // 张量声明 6 个类别, 名称表只有 3 项
  let coordinator = coordinator_with(
    vec![vec![vec![
      0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.1, 0.1, 0.1, 0.1, 0.95,
    ]]],
    11,
  );

  let result = coordinator
    .start_detection(RgbImage::from_pixel(64, 64, Rgb([0, 0, 0])))
    .unwrap()
    .wait();

  assert!(matches!(
    result,
    Err(CoordinatorError::Run(RunError::Decode(
      DecodeError::ClassCountMismatch {
        declared: 6,
        available: 3
      }
    )))
  ));
}

#[test]
fn recolor_reproduces_identical_geometry() {
  // 两个不同类别的互不重叠检测
  let mut coordinator = coordinator_with(
    vec![vec![
      vec![0.25, 0.25, 0.25, 0.25, 0.9, 0.95, 0.1, 0.1],
      vec![0.75, 0.75, 0.25, 0.25, 0.8, 0.1, 0.85, 0.1],
    ]],
    11,
  );
  let first_palette = coordinator.palette().clone();

  let first = coordinator
    .start_detection(RgbImage::from_pixel(200, 200, Rgb([0, 0, 0])))
    .unwrap()
    .wait()
    .unwrap();

  let second = coordinator.recolor().unwrap().wait().unwrap();
  let second_palette = coordinator.palette().clone();

  // 几何完全一致, 只有颜色可以不同
  assert_eq!(first.detections, second.detections);
  assert_eq!(first.image.dimensions(), second.image.dimensions());

  // 两个框的左上角都落在各自运行的类别颜色上
  assert_eq!(*first.image.get_pixel(25, 25), first_palette.color(0).unwrap());
  assert_eq!(
    *first.image.get_pixel(125, 125),
    first_palette.color(1).unwrap()
  );
  assert_eq!(
    *second.image.get_pixel(25, 25),
    second_palette.color(0).unwrap()
  );
  assert_eq!(
    *second.image.get_pixel(125, 125),
    second_palette.color(1).unwrap()
  );
}

#[test]
fn detection_after_recolor_overwrites_cache() {
  let mut coordinator = coordinator_with(
    vec![vec![vec![0.25, 0.25, 0.25, 0.25, 0.9, 0.95, 0.1, 0.1]]],
    11,
  );

  coordinator
    .start_detection(RgbImage::from_pixel(100, 100, Rgb([0, 0, 0])))
    .unwrap()
    .wait()
    .unwrap();
  coordinator.recolor().unwrap().wait().unwrap();

  // 重新着色之后依然可以发起新的完整检测
  let outcome = coordinator
    .start_detection(RgbImage::from_pixel(100, 100, Rgb([9, 9, 9])))
    .unwrap()
    .wait()
    .unwrap();
  assert_eq!(outcome.detections.len(), 1);
}
