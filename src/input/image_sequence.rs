// 该文件是 Guji （骨迹） 项目的一部分。
// src/input/image_sequence.rs - 视频帧序列输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! 从目录读取已经解出的视频帧（例如 `ffmpeg -i clip.mp4 frames/%06d.png`），
//! 按文件名排序，第 `i` 帧的时间戳为 `i * 1000 / fps` 毫秒。
//!
//! URL 形如 `frames:///path/to/frames?fps=30`。

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{FrameSource, InputError},
  url_path, url_query,
};

const DEFAULT_FPS: f64 = 30.0;
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧解码错误: {0}: {1}")]
  DecodeError(PathBuf, image::ImageError),
  #[error("无效的帧率: {0}")]
  InvalidFps(String),
}

pub struct ImageSequenceInput {
  frames: Vec<PathBuf>,
  fps: f64,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceInputError::SchemeMismatch);
    }

    let fps = match url_query::<f64>(url, "fps") {
      Some(Ok(fps)) => fps,
      Some(Err(raw)) => return Err(ImageSequenceInputError::InvalidFps(raw)),
      None => DEFAULT_FPS,
    };

    let directory = PathBuf::from(url_path(url));
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        frames.push(path);
      }
    }
    frames.sort();

    info!(
      "帧目录 {}: {} 帧, {} fps",
      directory.display(),
      frames.len(),
      fps
    );

    Self::from_paths(frames, fps)
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_lowercase();
      IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}

impl ImageSequenceInput {
  pub fn from_paths(frames: Vec<PathBuf>, fps: f64) -> Result<Self, ImageSequenceInputError> {
    if !fps.is_finite() || fps <= 0.0 {
      return Err(ImageSequenceInputError::InvalidFps(fps.to_string()));
    }
    Ok(Self { frames, fps })
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn fps(&self) -> f64 {
    self.fps
  }

  /// 时长以内的时间戳总能取到一帧，末尾附近取最后一帧
  fn nearest_index(&self, timestamp_ms: u64) -> Option<usize> {
    if self.frames.is_empty() || timestamp_ms > self.duration_ms() {
      return None;
    }
    let index = (timestamp_ms as f64 * self.fps / 1000.0).round() as usize;
    Some(index.min(self.frames.len() - 1))
  }
}

impl FrameSource for ImageSequenceInput {
  fn duration_ms(&self) -> u64 {
    (self.frames.len() as f64 * 1000.0 / self.fps).floor() as u64
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    let Some(path) = self
      .nearest_index(timestamp_ms)
      .and_then(|index| self.frames.get(index))
    else {
      debug!("时间戳 {}ms 超出帧序列", timestamp_ms);
      return Ok(None);
    };

    let image = ImageReader::open(path)
      .map_err(ImageSequenceInputError::IoError)?
      .decode()
      .map_err(|e| ImageSequenceInputError::DecodeError(path.clone(), e))?
      .to_rgb8();
    Ok(Some(image))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_frames(dir: &Path, count: usize) {
    for i in 0..count {
      RgbImage::from_pixel(4, 4, Rgb([i as u8, 0, 0]))
        .save(dir.join(format!("{:06}.png", i)))
        .unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
  }

  #[test]
  fn picks_nearest_frame_by_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), 3);
    let url = Url::parse(&format!("frames://{}?fps=30", dir.path().display())).unwrap();
    let mut input = ImageSequenceInput::from_url(&url).unwrap();

    assert_eq!(input.len(), 3);
    assert_eq!(input.duration_ms(), 100);
    assert_eq!(input.frame_at(0).unwrap().unwrap().get_pixel(0, 0)[0], 0);
    assert_eq!(input.frame_at(33).unwrap().unwrap().get_pixel(0, 0)[0], 1);
    assert_eq!(input.frame_at(66).unwrap().unwrap().get_pixel(0, 0)[0], 2);
    assert_eq!(input.frame_at(99).unwrap().unwrap().get_pixel(0, 0)[0], 2);
    assert!(input.frame_at(101).unwrap().is_none());
  }

  #[test]
  fn every_timestamp_within_duration_has_a_frame() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), 3);
    let mut input = ImageSequenceInput::from_url(
      &Url::parse(&format!("frames://{}?fps=30", dir.path().display())).unwrap(),
    )
    .unwrap();

    let missing: Vec<u64> = (0..=input.duration_ms())
      .filter(|&ts| input.frame_at(ts).unwrap().is_none())
      .collect();
    assert!(missing.is_empty(), "没有帧的时间戳: {:?}", missing);
  }

  #[test]
  fn empty_sequence_has_no_frames() {
    let mut input = ImageSequenceInput::from_paths(Vec::new(), 30.0).unwrap();
    assert_eq!(input.duration_ms(), 0);
    assert!(input.frame_at(0).unwrap().is_none());
  }

  #[test]
  fn broken_frame_is_reported_not_skipped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("000000.png");
    std::fs::write(&broken, b"garbage").unwrap();
    let mut input = ImageSequenceInput::from_paths(vec![broken], 30.0).unwrap();
    assert!(input.frame_at(0).is_err());
  }

  #[test]
  fn rejects_non_positive_fps() {
    assert!(matches!(
      ImageSequenceInput::from_paths(Vec::new(), 0.0),
      Err(ImageSequenceInputError::InvalidFps(_))
    ));
    let url = Url::parse("frames:///tmp?fps=fast").unwrap();
    assert!(matches!(
      ImageSequenceInput::from_url(&url),
      Err(ImageSequenceInputError::InvalidFps(_))
    ));
  }
}
