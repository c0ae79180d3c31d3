// 该文件是 Danqing （丹青） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;

/// Danqing 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图片路径
  #[arg(long, value_name = "FILE")]
  pub image: PathBuf,

  /// 类别名称文件路径 (每行一个类别名, 行号即类别编号)
  #[arg(long, value_name = "FILE")]
  pub classes: PathBuf,

  /// 外部推理引擎转储的原始输出张量文件
  /// (JSON 行向量, 可多次给出, 每个检测头一个;
  /// 不给出时使用占位引擎, 输出为空)
  #[arg(long = "tensor", value_name = "FILE")]
  pub tensors: Vec<PathBuf>,

  /// 标注结果输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS 交并比阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 关闭非极大值抑制, 绘制全部过阈值候选
  #[arg(long)]
  pub no_nms: bool,

  /// 调色板随机种子 (不给出时使用环境熵)
  #[arg(long, value_name = "SEED")]
  pub seed: Option<u64>,

  /// 检测结果 JSON 报告输出路径
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,

  /// 重新生成调色板后的第二次渲染输出路径 (不重新推理)
  #[arg(long, value_name = "FILE")]
  pub recolor_output: Option<PathBuf>,
}
