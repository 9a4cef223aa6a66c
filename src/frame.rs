// 该文件是 Guji （骨迹） 项目的一部分。
// src/frame.rs - NCHW 输入张量定义
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

use image::{RgbImage, imageops::FilterType};
use ndarray::ArrayView4;

use crate::pose::{MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH};

const RGB_CHANNELS: usize = 3;

/// 模型输入张量：`[1, 3, H, W]`，像素值缩放到 `[0, 1]`，不做均值/方差归一化
#[derive(Debug, Clone)]
pub struct RgbNchwTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

/// `pose_hrnet_w32_256x192` 的输入
pub type PoseInputTensor = RgbNchwTensor<MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT>;

impl<const W: u32, const H: u32> Default for RgbNchwTensor<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    Self {
      data: vec![0.0f32; size].into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> RgbNchwTensor<W, H> {
  /// 双线性缩放到 `W x H` 后按通道展开
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let resized;
    let image = if image.dimensions() == (W, H) {
      image
    } else {
      resized = image::imageops::resize(image, W, H, FilterType::Triangle);
      &resized
    };

    let mut tensor = Self::default();
    let plane = (W as usize) * (H as usize);
    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = (y as usize) * (W as usize) + (x as usize);
      for c in 0..RGB_CHANNELS {
        tensor.data[c * plane + idx] = f32::from(pixel[c]) / 255.0;
      }
    }
    tensor
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, H as usize, W as usize]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn as_array_view(&self) -> ArrayView4<'_, f32> {
    // 长度在构造时已经固定为 3 * H * W
    ArrayView4::from_shape((1, RGB_CHANNELS, H as usize, W as usize), &self.data)
      .unwrap_or_else(|_| unreachable!("张量长度与形状不一致"))
  }
}

impl<const W: u32, const H: u32> AsRef<[f32]> for RgbNchwTensor<W, H> {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn tensor_has_model_input_shape() {
    let tensor = PoseInputTensor::default();
    assert_eq!(tensor.shape(), [1, 3, 256, 192]);
    assert_eq!(tensor.as_nchw().len(), 3 * 256 * 192);
    assert_eq!(tensor.as_array_view().dim(), (1, 3, 256, 192));
  }

  #[test]
  fn pixels_are_split_into_planes_and_scaled() {
    let mut image = RgbImage::new(4, 2);
    image.put_pixel(1, 0, Rgb([255, 0, 51]));
    let tensor = RgbNchwTensor::<4, 2>::from_rgb_image(&image);
    let data = tensor.as_nchw();
    assert_eq!(data[1], 1.0);
    assert_eq!(data[8 + 1], 0.0);
    assert!((data[16 + 1] - 0.2).abs() < 1e-6);
    assert_eq!(data[0], 0.0);
  }

  #[test]
  fn larger_frames_are_resized() {
    let image = RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]));
    let tensor = PoseInputTensor::from_rgb_image(&image);
    assert!(tensor.as_nchw().iter().all(|v| (v - 1.0).abs() < 0.01));
  }
}
