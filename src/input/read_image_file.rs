// 该文件是 Guji （骨迹） 项目的一部分。
// src/input/read_image_file.rs - 单张图像输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{FrameSource, InputError},
  url_path, url_query,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Invalid duration: {0}")]
  InvalidDuration(String),
}

/// 静态图像输入
///
/// 在 `[0, duration]` 内的任何时间戳都返回同一张图，默认时长为 0，即只有一帧。
/// URL 形如 `image:///path/to/pose.png?duration=1000`。
pub struct ImageFileInput {
  image: RgbImage,
  duration_ms: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let duration_ms = match url_query::<u64>(url, "duration") {
      Some(Ok(duration)) => duration,
      Some(Err(raw)) => return Err(ImageFileInputError::InvalidDuration(raw)),
      None => 0,
    };

    let path = url_path(url);
    let image = ImageReader::open(&path)?.decode()?.to_rgb8();
    info!(
      "读取图像 {}: {}x{}",
      path,
      image.width(),
      image.height()
    );

    Ok(Self::new(image, duration_ms))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbImage, duration_ms: u64) -> Self {
    Self { image, duration_ms }
  }
}

impl FrameSource for ImageFileInput {
  fn duration_ms(&self) -> u64 {
    self.duration_ms
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    if timestamp_ms > self.duration_ms {
      return Ok(None);
    }
    Ok(Some(self.image.clone()))
  }
}
