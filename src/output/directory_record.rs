// 该文件是 Guji （骨迹） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use chrono::{Datelike, Utc};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{
    Render,
    draw::{Draw, DrawPoseOnFrame, Record},
  },
  task::PoseFrame,
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  /// 保存叠加骨架后的图像和关键点
  Draw(Box<Draw>),
  /// 保存原始帧和关键点
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &RgbImage,
    result: &PoseFrame,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        let image = draw.draw_pose(frame, result);
        image.save(path)?;
      }
      DrawWrapper::Record(_) => {
        frame.save(path)?;
      }
    };
    Record.record(result, path)?;

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record" => DrawWrapper::Record(Record),
      _ => DrawWrapper::Draw(Box::new(Draw::default())),
    }
  }
}

/// 每个采样帧保存为 `<目录>/<年>/<月>/<日>/<时-分-秒>-<时间戳>ms.png` 及同名 JSON
///
/// 默认只保存至少有一个有效关键点的帧，`?always` 保存全部帧，
/// `?record` 保存原始帧而不叠加骨架。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = if uri.query_pairs().any(|(k, _)| k == "record") {
      "record"
    } else {
      "draw"
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_path(uri)),
      draw: DrawWrapper::with(kind),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_path(&self, timestamp_ms: u64) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:08}ms.png",
      now.format("%H-%M-%S"),
      timestamp_ms
    )))
  }
}

impl Render<RgbImage, PoseFrame> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &PoseFrame) -> Result<(), Self::Error> {
    if !self.always && result.keypoints.valid_count() == 0 {
      debug!("时间戳 {}ms 没有有效关键点，跳过保存", result.timestamp_ms);
      return Ok(());
    }
    let path = self.frame_path(result.timestamp_ms)?;
    self.draw.save_result(&path, frame, result)
  }
}
