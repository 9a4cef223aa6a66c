// 该文件是 Guji （骨迹） 项目的一部分。
// src/input.rs - 视频帧输入
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

use image::RgbImage;
use thiserror::Error;

use crate::FromUrl;

/// 按时间戳取帧的输入源
pub trait FrameSource {
  /// 总时长（毫秒）
  fn duration_ms(&self) -> u64;

  /// 取最接近 `timestamp_ms` 的一帧，没有可用帧时返回 `Ok(None)`
  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
  fn duration_ms(&self) -> u64 {
    (**self).duration_ms()
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    (**self).frame_at(timestamp_ms)
  }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
  fn duration_ms(&self) -> u64 {
    (**self).duration_ms()
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    (**self).frame_at(timestamp_ms)
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "read_image_file")]
mod image_sequence;
#[cfg(feature = "read_image_file")]
pub use self::image_sequence::{ImageSequenceInput, ImageSequenceInputError};

#[cfg(feature = "gstreamer_input")]
mod video_file;
#[cfg(feature = "gstreamer_input")]
pub use self::video_file::{VideoFileInput, VideoFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_file")]
  #[error("Image sequence input error: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("Video file input error: {0}")]
  VideoFileInputError(#[from] VideoFileInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "read_image_file")]
  ImageSequence(ImageSequenceInput),
  #[cfg(feature = "gstreamer_input")]
  VideoFile(VideoFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
      if url.scheme() == ImageSequenceInput::SCHEME {
        let input = ImageSequenceInput::from_url(url)?;
        return Ok(InputWrapper::ImageSequence(input));
      }
    }
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == VideoFileInput::SCHEME {
        let input = VideoFileInput::from_url(url)?;
        return Ok(InputWrapper::VideoFile(input));
      }
    }
    let _ = url;
    Err(InputError::SchemeMismatch)
  }
}

impl FrameSource for InputWrapper {
  fn duration_ms(&self) -> u64 {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.duration_ms(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageSequence(input) => input.duration_ms(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::VideoFile(input) => input.duration_ms(),
    }
  }

  fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<RgbImage>, InputError> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.frame_at(timestamp_ms),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageSequence(input) => input.frame_at(timestamp_ms),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::VideoFile(input) => input.frame_at(timestamp_ms),
    }
  }
}
