// 该文件是 Danqing （丹青） 项目的一部分。
// src/coordinator.rs - 检测运行协调器
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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::annotator::{AnnotateError, Annotator};
use crate::classes::ClassNames;
use crate::decoder::{self, DecodeError, Detection};
use crate::engine::Engine;
use crate::palette::Palette;
use crate::suppressor;
use crate::tensor::{Blob, OutputTensor};

/// 默认置信度阈值
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// 默认 NMS 交并比阈值
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("阈值 {name} 超出范围 [0, 1]: {value}")]
  InvalidThreshold { name: &'static str, value: f32 },
}

/// 流水线配置。两个阈值在构造时校验, 运行开始后不再检查。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  confidence_threshold: f32,
  nms_threshold: f32,
  nms_enabled: bool,
}

impl PipelineConfig {
  pub fn new(confidence_threshold: f32, nms_threshold: f32) -> Result<Self, ConfigError> {
    if !(0.0..=1.0).contains(&confidence_threshold) {
      return Err(ConfigError::InvalidThreshold {
        name: "confidence",
        value: confidence_threshold,
      });
    }
    if !(0.0..=1.0).contains(&nms_threshold) {
      return Err(ConfigError::InvalidThreshold {
        name: "nms",
        value: nms_threshold,
      });
    }

    Ok(Self {
      confidence_threshold,
      nms_threshold,
      nms_enabled: true,
    })
  }

  /// 关闭非极大值抑制, 绘制全部过阈值候选 (诊断用)
  pub fn without_nms(mut self) -> Self {
    self.nms_enabled = false;
    self
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn nms_threshold(&self) -> f32 {
    self.nms_threshold
  }

  pub fn nms_enabled(&self) -> bool {
    self.nms_enabled
  }
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      nms_enabled: true,
    }
  }
}

/// 一次运行的产出: 标注后的图像与最终检测列表
#[derive(Debug)]
pub struct RunOutcome {
  pub image: RgbImage,
  pub detections: Vec<Detection>,
}

/// 后台运行中发生的错误, 经完成通道送回调用方
#[derive(Error, Debug)]
pub enum RunError {
  #[error("推理引擎错误: {0}")]
  Inference(#[source] anyhow::Error),
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Annotate(#[from] AnnotateError),
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
  #[error("已有运行未结束, 请求被拒绝")]
  RunInFlight,
  #[error("没有缓存的检测输出, 无法重新着色")]
  NothingCached,
  #[error("后台任务意外退出")]
  WorkerLost,
  #[error(transparent)]
  Run(#[from] RunError),
}

/// 一次后台运行的句柄。完成结果经单生产者单消费者通道送回,
/// 图像所有权随之移回调用方。
pub struct RunHandle {
  receiver: Receiver<Result<RunOutcome, RunError>>,
  worker: thread::JoinHandle<()>,
}

impl RunHandle {
  /// 阻塞等待运行结束并取回结果
  pub fn wait(self) -> Result<RunOutcome, CoordinatorError> {
    let result = self
      .receiver
      .recv()
      .map_err(|_| CoordinatorError::WorkerLost)?;
    let _ = self.worker.join();
    Ok(result?)
  }
}

/// 缓存的 (干净源图像, 原始输出) 对, 支持不重新推理的重新着色
struct RunCache {
  image: RgbImage,
  outputs: Vec<OutputTensor>,
}

struct SharedState {
  display_setup_widget: AtomicBool,
  ready_for_changes: AtomicBool,
  ready_for_detection: AtomicBool,
  running: AtomicBool,
  cache: Mutex<Option<RunCache>>,
}

/// 运行令牌: 持有期间独占协调器。
/// 释放时恢复标志位, 即使后台任务失败也不会卡死协调器。
struct RunToken {
  state: Arc<SharedState>,
  ready_for_detection_on_release: bool,
}

impl RunToken {
  fn acquire(state: &Arc<SharedState>, ready_for_detection_on_release: bool) -> Option<Self> {
    if state
      .running
      .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
      .is_err()
    {
      return None;
    }

    state.ready_for_changes.store(false, Ordering::Release);
    state.ready_for_detection.store(false, Ordering::Release);
    Some(RunToken {
      state: Arc::clone(state),
      ready_for_detection_on_release,
    })
  }
}

impl Drop for RunToken {
  fn drop(&mut self) {
    self.state.ready_for_changes.store(true, Ordering::Release);
    self
      .state
      .ready_for_detection
      .store(self.ready_for_detection_on_release, Ordering::Release);
    self.state.running.store(false, Ordering::Release);
  }
}

/// 检测运行协调器。
/// 持有调色板与最近一次运行的 (源图像, 原始输出) 缓存;
/// 每次运行在后台线程上执行 预处理 → 推理 → 解码 → 抑制 → 标注,
/// 运行期间由令牌独占, 并发请求被确定性拒绝。
pub struct Coordinator<E> {
  engine: Arc<E>,
  class_names: Arc<ClassNames>,
  config: PipelineConfig,
  palette: Palette,
  annotator: Arc<Annotator>,
  state: Arc<SharedState>,
}

impl<E> Coordinator<E>
where
  E: Engine + Send + Sync + 'static,
  E::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(
    engine: Arc<E>,
    class_names: Arc<ClassNames>,
    config: PipelineConfig,
    palette: Palette,
  ) -> Self {
    Self {
      engine,
      class_names,
      config,
      palette,
      annotator: Arc::new(Annotator::new()),
      state: Arc::new(SharedState {
        display_setup_widget: AtomicBool::new(true),
        ready_for_changes: AtomicBool::new(true),
        ready_for_detection: AtomicBool::new(true),
        running: AtomicBool::new(false),
        cache: Mutex::new(None),
      }),
    }
  }

  pub fn display_setup_widget(&self) -> bool {
    self.state.display_setup_widget.load(Ordering::Acquire)
  }

  pub fn set_display_setup_widget(&self, value: bool) {
    self.state.display_setup_widget.store(value, Ordering::Release);
  }

  pub fn is_ready_for_changes(&self) -> bool {
    self.state.ready_for_changes.load(Ordering::Acquire)
  }

  pub fn is_ready_for_detection(&self) -> bool {
    self.state.ready_for_detection.load(Ordering::Acquire)
  }

  pub fn has_cached_run(&self) -> bool {
    self.state.cache.lock().unwrap().is_some()
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn palette(&self) -> &Palette {
    &self.palette
  }

  pub fn class_names(&self) -> &ClassNames {
    &self.class_names
  }

  /// 启动一次完整检测: 预处理 → 推理 → 解码 → 抑制 → 标注。
  /// 图像所有权移入后台任务; 干净副本与原始输出在完成时存入缓存。
  pub fn start_detection(&self, image: RgbImage) -> Result<RunHandle, CoordinatorError> {
    let Some(token) = RunToken::acquire(&self.state, true) else {
      return Err(CoordinatorError::RunInFlight);
    };
    self.state.display_setup_widget.store(false, Ordering::Release);

    let engine = Arc::clone(&self.engine);
    let class_names = Arc::clone(&self.class_names);
    let annotator = Arc::clone(&self.annotator);
    let config = self.config.clone();
    // 运行期间使用调色板快照, 不读共享可变状态
    let palette = self.palette.clone();
    let state = Arc::clone(&self.state);

    let (sender, receiver) = mpsc::channel();
    let worker = thread::spawn(move || {
      let _token = token;
      let result = (|| {
        let blob = Blob::from_image(&image, engine.input_width(), engine.input_height());

        debug!("执行推理");
        let now = std::time::Instant::now();
        let outputs = engine
          .forward(&blob)
          .map_err(|e| RunError::Inference(anyhow::Error::new(e)))?;
        info!("推理完成, 耗时: {:.2?}", now.elapsed());

        let (annotated, detections) = run_postprocess(
          &outputs,
          image.clone(),
          &config,
          &palette,
          &class_names,
          &annotator,
        )?;

        *state.cache.lock().unwrap() = Some(RunCache { image, outputs });
        Ok(RunOutcome {
          image: annotated,
          detections,
        })
      })();
      let _ = sender.send(result);
    });

    Ok(RunHandle { receiver, worker })
  }

  /// 重新生成调色板并基于缓存的 (源图像, 原始输出) 重新渲染, 不重新推理。
  /// 运行结束后恢复之前的 ready_for_detection 值。
  pub fn recolor(&mut self) -> Result<RunHandle, CoordinatorError> {
    let cached = {
      let cache = self.state.cache.lock().unwrap();
      let Some(cache) = cache.as_ref() else {
        return Err(CoordinatorError::NothingCached);
      };
      (cache.image.clone(), cache.outputs.clone())
    };

    let ready = self.state.ready_for_detection.load(Ordering::Acquire);
    let Some(token) = RunToken::acquire(&self.state, ready) else {
      return Err(CoordinatorError::RunInFlight);
    };

    self.palette = Palette::random(self.class_names.len());
    debug!("调色板已重新生成, 共 {} 色", self.palette.len());

    let class_names = Arc::clone(&self.class_names);
    let annotator = Arc::clone(&self.annotator);
    let config = self.config.clone();
    let palette = self.palette.clone();

    let (sender, receiver) = mpsc::channel();
    let worker = thread::spawn(move || {
      let _token = token;
      let (image, outputs) = cached;
      let result = run_postprocess(&outputs, image, &config, &palette, &class_names, &annotator)
        .map(|(annotated, detections)| RunOutcome {
          image: annotated,
          detections,
        });
      let _ = sender.send(result);
    });

    Ok(RunHandle { receiver, worker })
  }

  /// 替换推理引擎。运行期间拒绝; 旧缓存随之失效。
  pub fn replace_engine(&mut self, engine: Arc<E>) -> Result<(), CoordinatorError> {
    if self.state.running.load(Ordering::Acquire) {
      return Err(CoordinatorError::RunInFlight);
    }
    self.engine = engine;
    *self.state.cache.lock().unwrap() = None;
    Ok(())
  }

  /// 替换类别名称表。调色板重新生成为新长度, 旧缓存失效。
  pub fn set_class_names(&mut self, class_names: Arc<ClassNames>) -> Result<(), CoordinatorError> {
    if self.state.running.load(Ordering::Acquire) {
      return Err(CoordinatorError::RunInFlight);
    }
    self.palette = Palette::random(class_names.len());
    self.class_names = class_names;
    *self.state.cache.lock().unwrap() = None;
    Ok(())
  }
}

/// 解码 → 抑制 → 标注, 检测运行与重新着色共用。
/// 传入的图像是干净源图像的副本, 就地标注后随结果返回。
fn run_postprocess(
  outputs: &[OutputTensor],
  mut image: RgbImage,
  config: &PipelineConfig,
  palette: &Palette,
  class_names: &ClassNames,
  annotator: &Annotator,
) -> Result<(RgbImage, Vec<Detection>), RunError> {
  let candidates = decoder::decode(
    outputs,
    image.width(),
    image.height(),
    config.confidence_threshold(),
    class_names.len(),
  )?;

  let detections = if config.nms_enabled() {
    suppressor::suppress(candidates, config.nms_threshold())
  } else {
    candidates
  };

  annotator.annotate(&mut image, &detections, palette, class_names)?;
  Ok((image, detections))
}
