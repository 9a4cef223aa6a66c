// 该文件是 Guji （骨迹） 项目的一部分。
// src/input/video_file.rs - GStreamer 视频文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频文件输入
//!
//! 用 `filesrc ! decodebin` 解码视频文件，时长取自容器元数据，
//! 每个时间戳精确定位（`ACCURATE` seek）到包含该时刻的那一帧。
//!
//! URL 形如 `gst://file/path/to/clip.mp4`。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! 在 `Cargo.toml` 中启用 `gstreamer_input` 特性。

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{FrameSource, InputError},
  url_path,
};

/// 状态切换与取帧的等待上限
const STATE_TIMEOUT_SECONDS: u64 = 10;

#[derive(Error, Debug)]
pub enum VideoFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("视频文件不存在: {0}")]
  FileNotFound(String),
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("状态切换失败: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("无法获取 appsink 元素")]
  AppSinkNotFound,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("无法读取视频时长")]
  UnknownDuration,
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("缓冲区大小不匹配: 期望至少 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

/// 可按时间戳随机访问的视频文件
pub struct VideoFileInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  duration_ms: u64,
}

impl FromUrlWithScheme for VideoFileInput {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for VideoFileInput {
  type Error = VideoFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(VideoFileInputError::SchemeMismatch);
    }
    Self::open(&url_path(url))
  }
}

fn pipeline_description(path: &str) -> String {
  format!(
    "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false max-buffers=1",
    path.replace('"', "\\\"")
  )
}

/// 实际定位的位置：超出时长返回 `None`，末尾时刻退到最后一帧之内
fn seek_position_ms(timestamp_ms: u64, duration_ms: u64) -> Option<u64> {
  if timestamp_ms > duration_ms {
    return None;
  }
  Some(timestamp_ms.min(duration_ms.saturating_sub(1)))
}

/// 按行跨度拷贝 RGB 数据，跳过行尾的对齐填充
fn rgb_image_from_strided(
  data: &[u8],
  width: usize,
  height: usize,
  stride: usize,
) -> Result<RgbImage, VideoFileInputError> {
  let row_bytes = width * 3;
  let expected = if height == 0 {
    0
  } else {
    stride * (height - 1) + row_bytes
  };
  if stride < row_bytes || data.len() < expected {
    return Err(VideoFileInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row_bytes * height);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + row_bytes]);
  }
  RgbImage::from_raw(width as u32, height as u32, pixels).ok_or(
    VideoFileInputError::BufferSizeMismatch {
      expected: row_bytes * height,
      actual: data.len(),
    },
  )
}

fn convert_sample(sample: &gst::Sample) -> Result<RgbImage, VideoFileInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| VideoFileInputError::PipelineError("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| VideoFileInputError::PipelineError("样本中没有 caps".to_string()))?;
  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| VideoFileInputError::VideoInfoError)?;

  let map = buffer.map_readable()?;
  rgb_image_from_strided(
    map.as_slice(),
    video_info.width() as usize,
    video_info.height() as usize,
    video_info.stride()[0] as usize,
  )
}

impl VideoFileInput {
  pub fn open(path: &str) -> Result<Self, VideoFileInputError> {
    if !std::path::Path::new(path).exists() {
      return Err(VideoFileInputError::FileNotFound(path.to_string()));
    }

    gst::init()?;

    let description = pipeline_description(path);
    info!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| VideoFileInputError::PipelineError("无法创建管道".to_string()))?;
    let appsink = pipeline
      .by_name("sink")
      .ok_or(VideoFileInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| VideoFileInputError::AppSinkNotFound)?;

    // 暂停状态下预滚第一帧之后才能查询时长和定位
    pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(STATE_TIMEOUT_SECONDS));
    result?;

    let duration_ms = pipeline
      .query_duration::<gst::ClockTime>()
      .map(|duration| duration.mseconds())
      .ok_or(VideoFileInputError::UnknownDuration)?;
    info!("视频时长: {}ms", duration_ms);

    Ok(Self {
      pipeline,
      appsink,
      duration_ms,
    })
  }

  fn seek_frame(&self, position_ms: u64) -> Result<Option<RgbImage>, VideoFileInputError> {
    self.pipeline.seek_simple(
      gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
      gst::ClockTime::from_mseconds(position_ms),
    )?;
    let (result, _, _) = self
      .pipeline
      .state(gst::ClockTime::from_seconds(STATE_TIMEOUT_SECONDS));
    result?;

    match self
      .appsink
      .try_pull_preroll(gst::ClockTime::from_seconds(STATE_TIMEOUT_SECONDS))
    {
      Some(sample) => convert_sample(&sample).map(Some),
      None => {
        warn!("定位到 {}ms 后没有取到帧", position_ms);
        Ok(None)
      }
    }
  }
}

impl Drop for VideoFileInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 管道失败: {}", e);
    }
  }
}

impl FrameSource for VideoFileInput {
  fn duration_ms(&self) -> u64 {
    self.duration_ms
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    let Some(position_ms) = seek_position_ms(timestamp_ms, self.duration_ms) else {
      debug!("时间戳 {}ms 超出视频时长", timestamp_ms);
      return Ok(None);
    };
    Ok(self.seek_frame(position_ms)?)
  }
}
