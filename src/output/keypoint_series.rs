// 该文件是 Guji （骨迹） 项目的一部分。
// src/output/keypoint_series.rs - 关键点时间序列输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  pose::{Joint, Keypoint},
  task::PoseFrame,
  url_path,
};

#[derive(Error, Debug)]
pub enum KeypointSeriesOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出文件锁已损坏")]
  Poisoned,
}

#[derive(Serialize)]
struct SeriesLine<'a> {
  timestamp_ms: u64,
  joints: Vec<SeriesJoint<'a>>,
}

#[derive(Serialize)]
struct SeriesJoint<'a> {
  joint: Joint,
  #[serde(flatten)]
  keypoint: &'a Keypoint,
}

/// 每个采样帧写一行 JSON，构成关键点时间序列
///
/// URL 形如 `jsonl:///path/to/series.jsonl`。
pub struct KeypointSeriesOutput {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for KeypointSeriesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for KeypointSeriesOutput {
  type Error = KeypointSeriesOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(KeypointSeriesOutputError::SchemeMismatch);
    }
    Self::create(url_path(url))
  }
}

impl KeypointSeriesOutput {
  pub fn create(path: impl AsRef<Path>) -> Result<Self, KeypointSeriesOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    info!("关键点序列写入: {}", path.display());
    Ok(Self {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl Render<RgbImage, PoseFrame> for KeypointSeriesOutput {
  type Error = KeypointSeriesOutputError;

  fn render_result(&self, _frame: &RgbImage, result: &PoseFrame) -> Result<(), Self::Error> {
    let line = SeriesLine {
      timestamp_ms: result.timestamp_ms,
      joints: result
        .keypoints
        .iter()
        .map(|(joint, keypoint)| SeriesJoint { joint, keypoint })
        .collect(),
    };

    let mut writer = self
      .writer
      .lock()
      .map_err(|_| KeypointSeriesOutputError::Poisoned)?;
    serde_json::to_writer(&mut *writer, &line)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}
