// 该文件是 Danqing （丹青） 项目的一部分。
// src/palette.rs - 类别调色板
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

use image::Rgb;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// 文本颜色亮度分界 (0-255 尺度): 类别颜色均值低于该值时用白色文本
const TEXT_BRIGHTNESS_THRESHOLD: f32 = 70.0;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// 调色板: 每个类别一个颜色, 按类别编号索引, 按需整体重新生成。
/// 渲染期间只读; 每次运行使用启动时的快照。
#[derive(Debug, Clone)]
pub struct Palette {
  colors: Vec<Rgb<u8>>,
}

impl Palette {
  /// 用环境熵随机生成调色板
  pub fn random(num_classes: usize) -> Self {
    Self::generate(&mut rand::rng(), num_classes)
  }

  /// 由种子生成可复现的调色板
  pub fn seeded(num_classes: usize, seed: u64) -> Self {
    Self::generate(&mut StdRng::seed_from_u64(seed), num_classes)
  }

  fn generate<R: Rng>(rng: &mut R, num_classes: usize) -> Self {
    let colors = (0..num_classes)
      .map(|_| Rgb([rng.random(), rng.random(), rng.random()]))
      .collect();
    Self { colors }
  }

  pub fn color(&self, class_id: usize) -> Option<Rgb<u8>> {
    self.colors.get(class_id).copied()
  }

  pub fn len(&self) -> usize {
    self.colors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  /// 根据类别颜色选择对比度足够的文本颜色:
  /// 颜色通道均值低于分界值时用白色, 否则用黑色。
  pub fn contrast_color(color: Rgb<u8>) -> Rgb<u8> {
    let mean = (color[0] as f32 + color[1] as f32 + color[2] as f32) / 3.0;
    if mean < TEXT_BRIGHTNESS_THRESHOLD {
      WHITE
    } else {
      BLACK
    }
  }
}
