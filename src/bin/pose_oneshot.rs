// 该文件是 Guji （骨迹） 项目的一部分。
// src/bin/pose_oneshot.rs - 单帧姿态推理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use guji::{
  FromUrl,
  input::InputWrapper,
  model::OnnxPoseBuilder,
  output::OutputWrapper,
  pose::{DEFAULT_CONFIDENCE_FLOOR, PoseConfig},
  task::{OneShotTask, Task},
};

/// 对输入的第一帧做一次姿态推理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 姿态模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_FLOOR, value_name = "THRESHOLD")]
  pub confidence: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = OnnxPoseBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let config = PoseConfig::default().with_confidence_floor(args.confidence);
  let pose = OneShotTask::new(config).run_task(input, model, output)?;

  for (joint, keypoint) in pose.keypoints.iter().filter(|(_, k)| k.valid) {
    info!(
      "{}: ({:.0}, {:.0}) 置信度 {:.3}",
      joint.name(),
      keypoint.x,
      keypoint.y,
      keypoint.confidence
    );
  }

  Ok(())
}
