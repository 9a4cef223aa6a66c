// 该文件是 Guji （骨迹） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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

use std::{cell::RefCell, collections::HashSet, io};

use image::{Rgb, RgbImage};
use ndarray::Array3;

use guji::{
  frame::PoseInputTensor,
  input::{FrameSource, InputError},
  model::{FnModel, PoseModel},
  output::Render,
  pose::{Heatmap, Joint, PoseConfig, PoseError},
  task::{
    CancelFlag, FrameError, OneShotTask, PipelineError, PipelineStats, PoseEvent, PoseFrame,
    PosePipeline, PoseTask, SkipReason, Task,
  },
};

/// 内存中的输入源，记录被请求的时间戳
struct MemorySource {
  duration_ms: u64,
  missing: HashSet<u64>,
  broken: HashSet<u64>,
  requested: Vec<u64>,
}

impl MemorySource {
  fn new(duration_ms: u64) -> Self {
    Self {
      duration_ms,
      missing: HashSet::new(),
      broken: HashSet::new(),
      requested: Vec::new(),
    }
  }

  fn with_missing(mut self, timestamps: &[u64]) -> Self {
    self.missing.extend(timestamps.iter().copied());
    self
  }

  fn with_broken(mut self, timestamps: &[u64]) -> Self {
    self.broken.extend(timestamps.iter().copied());
    self
  }
}

impl FrameSource for MemorySource {
  fn duration_ms(&self) -> u64 {
    self.duration_ms
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    self.requested.push(timestamp_ms);
    if self.missing.contains(&timestamp_ms) {
      return Ok(None);
    }
    if self.broken.contains(&timestamp_ms) {
      return Err(InputError::SchemeMismatch);
    }
    Ok(Some(RgbImage::from_pixel(192, 256, Rgb([128, 128, 128]))))
  }
}

fn spike_heatmap(joint: usize, y: usize, x: usize) -> Heatmap {
  let mut data = Array3::<f32>::zeros((17, 64, 48));
  data[[joint, y, x]] = 1.0;
  Heatmap::from_array(data)
}

fn nose_model() -> FnModel<impl Fn(&PoseInputTensor) -> Result<Heatmap, io::Error>, io::Error> {
  FnModel::new(|_: &PoseInputTensor| Ok(spike_heatmap(0, 10, 5)))
}

fn annotated<M: PoseModel>(pipeline: &mut PosePipeline<MemorySource, M>) -> Vec<PoseFrame> {
  pipeline
    .run()
    .filter_map(|event| match event {
      PoseEvent::Annotated { pose, .. } => Some(pose),
      _ => None,
    })
    .collect()
}

#[derive(Default)]
struct Collect {
  poses: RefCell<Vec<PoseFrame>>,
}

impl Render<RgbImage, PoseFrame> for Collect {
  type Error = io::Error;

  fn render_result(&self, _frame: &RgbImage, result: &PoseFrame) -> Result<(), Self::Error> {
    self.poses.borrow_mut().push(result.clone());
    Ok(())
  }
}

#[test]
fn visits_floor_d_over_s_plus_one_timestamps_in_order() {
  let mut pipeline =
    PosePipeline::new(MemorySource::new(100), nose_model(), &PoseConfig::default(), 33).unwrap();

  let timestamps: Vec<u64> = pipeline.run().map(|event| event.timestamp_ms()).collect();
  assert_eq!(timestamps, vec![0, 33, 66, 99]);
  assert_eq!(pipeline.source().requested, vec![0, 33, 66, 99]);
}

#[test]
fn duration_on_a_step_boundary_includes_the_last_timestamp() {
  let mut pipeline =
    PosePipeline::new(MemorySource::new(99), nose_model(), &PoseConfig::default(), 33).unwrap();
  assert_eq!(pipeline.run().count(), 4);

  let mut pipeline =
    PosePipeline::new(MemorySource::new(0), nose_model(), &PoseConfig::default(), 33).unwrap();
  assert_eq!(pipeline.run().count(), 1);
}

#[test]
fn zero_step_is_rejected() {
  let result = PosePipeline::new(MemorySource::new(100), nose_model(), &PoseConfig::default(), 0);
  assert!(matches!(result, Err(PipelineError::ZeroStep)));
}

#[test]
fn end_to_end_nose_spike() {
  let mut pipeline =
    PosePipeline::new(MemorySource::new(0), nose_model(), &PoseConfig::default(), 33).unwrap();

  let events: Vec<_> = pipeline.run().collect();
  let PoseEvent::Annotated { frame, pose } = &events[0] else {
    panic!("时间戳 0 应该被解码");
  };
  assert_eq!(frame.dimensions(), (192, 256));
  assert_eq!(pose.source_size, (192, 256));

  let nose = pose.keypoints[Joint::Nose];
  assert!(nose.valid);
  assert_eq!((nose.x, nose.y), (20.0, 40.0));
  assert_eq!(pose.keypoints.valid_count(), 1);
  assert!(pose.segments.is_empty());
}

#[test]
fn missing_frames_are_skipped_and_counted() {
  let source = MemorySource::new(100).with_missing(&[33, 99]);
  let mut pipeline = PosePipeline::new(source, nose_model(), &PoseConfig::default(), 33).unwrap();

  let mut run = pipeline.run();
  let skipped: Vec<u64> = run
    .by_ref()
    .filter_map(|event| match event {
      PoseEvent::Skipped {
        timestamp_ms,
        reason: SkipReason::FrameUnavailable,
      } => Some(timestamp_ms),
      _ => None,
    })
    .collect();
  assert_eq!(skipped, vec![33, 99]);
  assert_eq!(
    run.stats(),
    PipelineStats {
      visited: 4,
      annotated: 2,
      skipped: 2,
      failed: 0,
    }
  );
}

#[test]
fn unreadable_frames_are_skipped_not_failed() {
  let source = MemorySource::new(99).with_missing(&[33]).with_broken(&[66]);
  let mut pipeline = PosePipeline::new(source, nose_model(), &PoseConfig::default(), 33).unwrap();

  let mut run = pipeline.run();
  let events: Vec<_> = run.by_ref().collect();
  assert!(matches!(
    events[1],
    PoseEvent::Skipped {
      timestamp_ms: 33,
      reason: SkipReason::FrameUnavailable,
    }
  ));
  assert!(matches!(
    events[2],
    PoseEvent::Skipped {
      timestamp_ms: 66,
      reason: SkipReason::ReadFailed(InputError::SchemeMismatch),
    }
  ));
  assert_eq!(
    run.stats(),
    PipelineStats {
      visited: 4,
      annotated: 2,
      skipped: 2,
      failed: 0,
    }
  );
}

#[test]
fn per_frame_failures_do_not_stop_the_run() {
  let model = FnModel::new(|_: &PoseInputTensor| -> Result<Heatmap, io::Error> {
    Ok(Heatmap::from_array(Array3::from_elem((17, 64, 32), 0.5)))
  });
  let mut pipeline = PosePipeline::new(MemorySource::new(66), model, &PoseConfig::default(), 33).unwrap();

  let mut run = pipeline.run();
  let events: Vec<_> = run.by_ref().collect();
  assert_eq!(events.len(), 3);
  for event in &events {
    assert!(matches!(
      event,
      PoseEvent::Failed {
        error: FrameError::Pose(PoseError::InvalidHeatmapShape { .. }),
        ..
      }
    ));
  }
  assert_eq!(run.stats().failed, 3);
}

#[test]
fn inference_errors_are_reported_per_frame() {
  let model = FnModel::new(|_: &PoseInputTensor| -> Result<Heatmap, io::Error> {
    Err(io::Error::other("模型不可用"))
  });
  let mut pipeline = PosePipeline::new(MemorySource::new(33), model, &PoseConfig::default(), 33).unwrap();

  let events: Vec<_> = pipeline.run().collect();
  assert_eq!(events.len(), 2);
  assert!(
    events
      .iter()
      .all(|event| matches!(event, PoseEvent::Failed { error: FrameError::Inference(_), .. }))
  );
}

#[test]
fn runs_are_restartable_and_deterministic() {
  let mut pipeline =
    PosePipeline::new(MemorySource::new(66), nose_model(), &PoseConfig::default(), 33).unwrap();

  let first = annotated(&mut pipeline);
  let second = annotated(&mut pipeline);
  assert_eq!(first.len(), 3);
  assert_eq!(first, second);
}

#[test]
fn cancellation_stops_before_the_next_timestamp() {
  let cancel = CancelFlag::default();
  let mut pipeline =
    PosePipeline::new(MemorySource::new(1000), nose_model(), &PoseConfig::default(), 33)
      .unwrap()
      .with_cancel_flag(cancel.clone());

  let mut run = pipeline.run();
  assert!(run.next().is_some());
  assert!(run.next().is_some());
  cancel.cancel();
  assert!(run.next().is_none());
  assert!(run.next().is_none());
  assert_eq!(run.stats().visited, 2);
}

#[test]
fn frame_number_limits_visited_timestamps() {
  let mut pipeline =
    PosePipeline::new(MemorySource::new(1000), nose_model(), &PoseConfig::default(), 33)
      .unwrap()
      .with_frame_number(Some(5));
  assert_eq!(pipeline.run().count(), 5);
}

#[test]
fn pose_task_renders_every_annotated_frame() {
  let output = Collect::default();
  let source = MemorySource::new(132).with_missing(&[66]);

  let stats = PoseTask::new(PoseConfig::default(), 33)
    .run_task(source, nose_model(), &output)
    .unwrap();

  assert_eq!(stats.visited, 5);
  assert_eq!(stats.skipped, 1);
  let timestamps: Vec<u64> = output.poses.borrow().iter().map(|p| p.timestamp_ms).collect();
  assert_eq!(timestamps, vec![0, 33, 99, 132]);
}

#[test]
fn one_shot_task_returns_the_first_pose() {
  let output = Collect::default();
  let pose = OneShotTask::new(PoseConfig::default())
    .run_task(MemorySource::new(1000), nose_model(), &output)
    .unwrap();

  assert_eq!(pose.timestamp_ms, 0);
  assert_eq!(output.poses.borrow().len(), 1);
}

#[test]
fn one_shot_task_fails_without_a_frame() {
  let output = Collect::default();
  let result = OneShotTask::new(PoseConfig::default()).run_task(
    MemorySource::new(0).with_missing(&[0]),
    nose_model(),
    &output,
  );

  assert!(result.is_err());
  assert!(output.poses.borrow().is_empty());
}
