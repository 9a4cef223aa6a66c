// 该文件是 Guji （骨迹） 项目的一部分。
// src/task.rs - 逐帧姿态解码流水线与任务
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

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::PoseInputTensor,
  input::{FrameSource, InputError},
  model::PoseModel,
  output::Render,
  pose::{
    FrameAnnotator, Joint, KeypointSet, MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH, Point, PoseConfig,
    PoseError, Segment, to_source_space,
  },
};

/// 一个采样时间戳的解码结果
///
/// 关键点与线段在模型输入坐标下，`source_*` 方法换算到原始帧坐标。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseFrame {
  pub timestamp_ms: u64,
  /// 原始帧尺寸 (宽, 高)
  pub source_size: (u32, u32),
  /// 模型输入尺寸 (宽, 高)
  pub input_size: (u32, u32),
  pub keypoints: KeypointSet,
  pub segments: Vec<Segment>,
}

impl PoseFrame {
  pub fn source_segments(&self) -> impl Iterator<Item = Segment> + '_ {
    self.segments.iter().map(move |segment| {
      segment.map_points(|p| to_source_space(p, self.input_size, self.source_size))
    })
  }

  /// 有效关键点在原始帧中的位置
  pub fn source_keypoints(&self) -> impl Iterator<Item = (Joint, Point)> + '_ {
    self
      .keypoints
      .iter()
      .filter(|(_, keypoint)| keypoint.valid)
      .map(move |(joint, keypoint)| {
        (
          joint,
          to_source_space(keypoint.point(), self.input_size, self.source_size),
        )
      })
  }
}

/// 协作式取消标志，可以在线程间克隆共享
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  /// 清除取消状态，流水线可以重新运行
  pub fn reset(&self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

/// Ctrl-C 时置位取消标志；30 秒内流水线没有退出则强制结束进程
pub fn install_ctrlc_handler(flag: CancelFlag) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    flag.cancel();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
  #[error("采样间隔必须大于 0 毫秒")]
  ZeroStep,
  #[error("模型输入尺寸 {actual:?} 与输入张量尺寸 {expected:?} 不一致")]
  InputSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// 单帧失败的原因，不会中断整个流水线
#[derive(Error, Debug)]
pub enum FrameError<E> {
  #[error("推理失败: {0}")]
  Inference(E),
  #[error("热力图解码失败: {0}")]
  Pose(#[from] PoseError),
}

/// 跳过的时间戳计入 `skipped`，不计入 `failed`
#[derive(Error, Debug)]
pub enum SkipReason {
  /// 输入源在该时间戳没有帧
  #[error("没有可用帧")]
  FrameUnavailable,
  /// 读取或解码帧失败
  #[error("读取帧失败: {0}")]
  ReadFailed(#[from] InputError),
}

pub enum PoseEvent<E> {
  Annotated { frame: RgbImage, pose: PoseFrame },
  Skipped { timestamp_ms: u64, reason: SkipReason },
  Failed { timestamp_ms: u64, error: FrameError<E> },
}

impl<E> PoseEvent<E> {
  pub fn timestamp_ms(&self) -> u64 {
    match self {
      PoseEvent::Annotated { pose, .. } => pose.timestamp_ms,
      PoseEvent::Skipped { timestamp_ms, .. } | PoseEvent::Failed { timestamp_ms, .. } => {
        *timestamp_ms
      }
    }
  }
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PipelineStats {
  pub visited: usize,
  pub annotated: usize,
  pub skipped: usize,
  pub failed: usize,
}

/// 按固定间隔采样输入源，对每一帧推理并解码姿态
///
/// 访问的时间戳为 `0, step, 2·step, …`，不超过输入时长，共 `floor(D/S)+1` 个。
/// 同一个流水线可以多次 [`run`](Self::run)，每次都从 0 开始。
pub struct PosePipeline<S, M> {
  source: S,
  model: M,
  annotator: FrameAnnotator,
  input_size: (u32, u32),
  step_ms: u64,
  frame_number: Option<usize>,
  cancel: CancelFlag,
}

impl<S: FrameSource, M: PoseModel> PosePipeline<S, M> {
  pub fn new(source: S, model: M, config: &PoseConfig, step_ms: u64) -> Result<Self, PipelineError> {
    if step_ms == 0 {
      return Err(PipelineError::ZeroStep);
    }
    let expected = (MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT);
    if config.input_size() != expected {
      return Err(PipelineError::InputSizeMismatch {
        expected,
        actual: config.input_size(),
      });
    }

    Ok(Self {
      source,
      model,
      annotator: FrameAnnotator::new(config),
      input_size: config.input_size(),
      step_ms,
      frame_number: None,
      cancel: CancelFlag::default(),
    })
  }

  /// 最多访问的时间戳个数
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn cancel_flag(&self) -> CancelFlag {
    self.cancel.clone()
  }

  pub fn step_ms(&self) -> u64 {
    self.step_ms
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// 惰性地产生每个时间戳的事件
  pub fn run(&mut self) -> PoseRun<'_, S, M> {
    let duration_ms = self.source.duration_ms();
    info!(
      "开始采样: 时长 {}ms, 间隔 {}ms, 共 {} 个时间戳",
      duration_ms,
      self.step_ms,
      duration_ms / self.step_ms + 1
    );
    PoseRun {
      pipeline: self,
      duration_ms,
      next_timestamp: Some(0),
      stats: PipelineStats::default(),
    }
  }

  fn process(&mut self, timestamp_ms: u64) -> PoseEvent<M::Error> {
    let frame = match self.source.frame_at(timestamp_ms) {
      Ok(Some(frame)) => frame,
      Ok(None) => {
        return PoseEvent::Skipped {
          timestamp_ms,
          reason: SkipReason::FrameUnavailable,
        };
      }
      Err(error) => {
        return PoseEvent::Skipped {
          timestamp_ms,
          reason: error.into(),
        };
      }
    };

    match self.decode(timestamp_ms, &frame) {
      Ok(pose) => PoseEvent::Annotated { frame, pose },
      Err(error) => PoseEvent::Failed {
        timestamp_ms,
        error,
      },
    }
  }

  fn decode(&mut self, timestamp_ms: u64, frame: &RgbImage) -> Result<PoseFrame, FrameError<M::Error>> {
    let tensor = PoseInputTensor::from_rgb_image(frame);
    let now = Instant::now();
    let heatmap = self.model.infer(&tensor).map_err(FrameError::Inference)?;
    let elapsed = now.elapsed();
    let annotation = self.annotator.annotate(&heatmap)?;
    info!(
      "时间戳 {}ms 推理完成，耗时: {:.2?} / {:.2?}，有效关键点 {} 个",
      timestamp_ms,
      elapsed,
      now.elapsed(),
      annotation.keypoints.valid_count()
    );

    Ok(PoseFrame {
      timestamp_ms,
      source_size: frame.dimensions(),
      input_size: self.input_size,
      keypoints: annotation.keypoints,
      segments: annotation.segments,
    })
  }
}

/// [`PosePipeline::run`] 返回的迭代器
pub struct PoseRun<'a, S, M> {
  pipeline: &'a mut PosePipeline<S, M>,
  duration_ms: u64,
  next_timestamp: Option<u64>,
  stats: PipelineStats,
}

impl<S, M> PoseRun<'_, S, M> {
  pub fn stats(&self) -> PipelineStats {
    self.stats
  }
}

impl<S: FrameSource, M: PoseModel> Iterator for PoseRun<'_, S, M> {
  type Item = PoseEvent<M::Error>;

  fn next(&mut self) -> Option<Self::Item> {
    let timestamp_ms = self.next_timestamp.filter(|ts| *ts <= self.duration_ms)?;

    if self.pipeline.cancel.is_cancelled() {
      warn!("中断信号接收，停止于 {}ms", timestamp_ms);
      self.next_timestamp = None;
      return None;
    }
    if let Some(limit) = self.pipeline.frame_number
      && self.stats.visited >= limit
    {
      info!("达到指定帧数 {}, 停止采样", limit);
      self.next_timestamp = None;
      return None;
    }

    self.next_timestamp = timestamp_ms.checked_add(self.pipeline.step_ms);
    self.stats.visited += 1;

    let event = self.pipeline.process(timestamp_ms);
    match &event {
      PoseEvent::Annotated { .. } => self.stats.annotated += 1,
      PoseEvent::Skipped { reason, .. } => {
        self.stats.skipped += 1;
        warn!("时间戳 {}ms 跳过: {}", timestamp_ms, reason);
      }
      PoseEvent::Failed { .. } => self.stats.failed += 1,
    }
    Some(event)
  }
}

pub trait Task<S, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, source: S, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 处理整段输入，单帧失败只记录日志
#[derive(Debug, Clone, Default)]
pub struct PoseTask {
  config: PoseConfig,
  step_ms: u64,
  frame_number: Option<usize>,
  cancel: CancelFlag,
}

impl PoseTask {
  pub fn new(config: PoseConfig, step_ms: u64) -> Self {
    Self {
      config,
      step_ms,
      ..Default::default()
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
    self.cancel = cancel;
    self
  }
}

impl<S, M, O, ME, RE> Task<S, M, O> for PoseTask
where
  S: FrameSource,
  M: PoseModel<Error = ME>,
  O: Render<RgbImage, PoseFrame, Error = RE>,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Output = PipelineStats;
  type Error = anyhow::Error;

  fn run_task(self, source: S, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let mut pipeline = PosePipeline::new(source, model, &self.config, self.step_ms)?
      .with_frame_number(self.frame_number)
      .with_cancel_flag(self.cancel);

    let mut run = pipeline.run();
    for event in run.by_ref() {
      match event {
        PoseEvent::Annotated { frame, pose } => {
          let now = Instant::now();
          output.render_result(&frame, &pose)?;
          debug!("时间戳 {}ms 渲染完成，耗时: {:.2?}", pose.timestamp_ms, now.elapsed());
        }
        PoseEvent::Skipped { .. } => {}
        PoseEvent::Failed {
          timestamp_ms,
          error: e,
        } => {
          error!("时间戳 {}ms 处理失败: {}", timestamp_ms, e);
        }
      }
    }

    let stats = run.stats();
    info!(
      "任务完成: 访问 {} 帧, 解码 {} 帧, 跳过 {} 帧, 失败 {} 帧",
      stats.visited, stats.annotated, stats.skipped, stats.failed
    );
    Ok(stats)
  }
}

/// 只处理时间戳 0 的一帧，失败直接返回错误
#[derive(Debug, Clone, Default)]
pub struct OneShotTask {
  config: PoseConfig,
}

impl OneShotTask {
  pub fn new(config: PoseConfig) -> Self {
    Self { config }
  }
}

impl<S, M, O, ME, RE> Task<S, M, O> for OneShotTask
where
  S: FrameSource,
  M: PoseModel<Error = ME>,
  O: Render<RgbImage, PoseFrame, Error = RE>,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Output = PoseFrame;
  type Error = anyhow::Error;

  fn run_task(self, source: S, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let mut pipeline = PosePipeline::new(source, model, &self.config, 1)?.with_frame_number(Some(1));

    let event = pipeline
      .run()
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    match event {
      PoseEvent::Annotated { frame, pose } => {
        output.render_result(&frame, &pose)?;
        info!("渲染完成");
        Ok(pose)
      }
      PoseEvent::Skipped {
        timestamp_ms,
        reason,
      } => Err(anyhow::anyhow!("时间戳 {}ms 跳过: {}", timestamp_ms, reason)),
      PoseEvent::Failed { error, .. } => Err(error.into()),
    }
  }
}
