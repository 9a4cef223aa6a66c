// 该文件是 Guji （骨迹） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use guji::{
  FromUrl,
  input::{FrameSource, InputWrapper},
  model::OnnxPoseBuilder,
  output::OutputWrapper,
  pose::PoseConfig,
  task::{CancelFlag, PoseTask, Task, install_ctrlc_handler},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("采样间隔: {}ms", args.step_ms);
  info!("置信度下限: {}", args.confidence);

  let input = InputWrapper::from_url(&args.input)?;
  info!("输入时长: {}ms", input.duration_ms());
  let model = OnnxPoseBuilder::from_url(&args.model)?.build()?;
  info!("模型加载完成");
  let output = OutputWrapper::from_url(&args.output)?;

  let cancel = CancelFlag::default();
  install_ctrlc_handler(cancel.clone())?;

  let config = PoseConfig::default().with_confidence_floor(args.confidence);
  let stats = PoseTask::new(config, args.step_ms)
    .with_frame_number(args.frame_number)
    .with_cancel_flag(cancel)
    .run_task(input, model, output)?;

  if stats.failed > 0 {
    tracing::warn!("{} 个时间戳处理失败", stats.failed);
  }

  Ok(())
}
