// 该文件是 Danqing （丹青） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbImage;
use tracing::{info, warn};

use danqing::classes::ClassNames;
use danqing::coordinator::{Coordinator, PipelineConfig};
use danqing::engine::{Engine, StubEngine, TensorFileEngine};
use danqing::input::{self, DISPLAY_MAX_HEIGHT, DISPLAY_MAX_WIDTH};
use danqing::palette::Palette;
use danqing::report;

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入图片: {}", args.image.display());
  info!("类别文件: {}", args.classes.display());
  info!("输出文件: {}", args.output.display());
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.nms_threshold);

  let mut config = PipelineConfig::new(args.confidence, args.nms_threshold)?;
  if args.no_nms {
    config = config.without_nms();
  }

  let class_names = Arc::new(
    ClassNames::from_file(&args.classes)
      .with_context(|| format!("无法读取类别文件: {}", args.classes.display()))?,
  );
  info!("共 {} 个类别", class_names.len());

  let palette = match args.seed {
    Some(seed) => Palette::seeded(class_names.len(), seed),
    None => Palette::random(class_names.len()),
  };

  let image = input::load_image(&args.image)
    .with_context(|| format!("无法读取图片: {}", args.image.display()))?;
  let image = input::fit_to_display(image, DISPLAY_MAX_WIDTH, DISPLAY_MAX_HEIGHT);
  info!("图片尺寸: {}x{}", image.width(), image.height());

  if args.tensors.is_empty() {
    warn!("未提供张量文件, 使用占位引擎");
    run(
      Arc::new(StubEngine::new()),
      &args,
      config,
      class_names,
      palette,
      image,
    )
  } else {
    run(
      Arc::new(TensorFileEngine::new(args.tensors.clone())),
      &args,
      config,
      class_names,
      palette,
      image,
    )
  }
}

fn run<E>(
  engine: Arc<E>,
  args: &args::Args,
  config: PipelineConfig,
  class_names: Arc<ClassNames>,
  palette: Palette,
  image: RgbImage,
) -> Result<()>
where
  E: Engine + Send + Sync + 'static,
  E::Error: std::error::Error + Send + Sync + 'static,
{
  let mut coordinator = Coordinator::new(engine, Arc::clone(&class_names), config, palette);

  info!("开始检测...");
  let now = std::time::Instant::now();
  let outcome = coordinator.start_detection(image)?.wait()?;
  info!(
    "检测完成, 耗时: {:.2?}, 共 {} 个目标",
    now.elapsed(),
    outcome.detections.len()
  );

  for det in &outcome.detections {
    let name = class_names.get(det.class_id).unwrap_or("unknown");
    info!(
      "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
      name,
      det.class_probability * 100.0,
      det.bbox.left(),
      det.bbox.top(),
      det.bbox.width,
      det.bbox.height
    );
  }

  outcome
    .image
    .save(&args.output)
    .with_context(|| format!("无法保存图片: {}", args.output.display()))?;
  info!("标注结果已保存: {}", args.output.display());

  if let Some(report_path) = &args.report {
    report::save_report(report_path, &outcome.detections, &class_names)
      .with_context(|| format!("无法写入检测报告: {}", report_path.display()))?;
    info!("检测报告已保存: {}", report_path.display());
  }

  if let Some(recolor_path) = &args.recolor_output {
    info!("重新生成调色板并再次渲染...");
    let recolored = coordinator.recolor()?.wait()?;
    recolored
      .image
      .save(recolor_path)
      .with_context(|| format!("无法保存图片: {}", recolor_path.display()))?;
    info!("重新着色结果已保存: {}", recolor_path.display());
  }

  Ok(())
}
