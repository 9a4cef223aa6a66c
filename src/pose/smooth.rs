// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose/smooth.rs - 热力图高斯平滑
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array2, ArrayView2};

/// 一维高斯核（已归一化），尺寸为偶数时向上取奇数
pub fn gaussian_kernel(size: usize, sigma: f32) -> Box<[f32]> {
  let size = size.max(1) | 1;
  let center = (size / 2) as f32;
  let two_sigma_sq = 2.0 * sigma * sigma;

  let mut kernel: Vec<f32> = (0..size)
    .map(|i| {
      let d = i as f32 - center;
      (-(d * d) / two_sigma_sq).exp()
    })
    .collect();
  let sum: f32 = kernel.iter().sum();
  kernel.iter_mut().for_each(|k| *k /= sum);
  kernel.into_boxed_slice()
}

// 边界按 reflect-101 处理: -1 -> 1, n -> n - 2
fn reflect_101(index: isize, len: usize) -> usize {
  if len == 1 {
    return 0;
  }
  let len = len as isize;
  let period = 2 * (len - 1);
  let mut i = index.rem_euclid(period);
  if i >= len {
    i = period - i;
  }
  i as usize
}

/// 可分离高斯平滑
///
/// 中间结果缓存在 `horizontal` 中，构造时按网格尺寸分配，之后每帧复用。
/// 同一个实例不能在多个线程间共享。
#[derive(Debug, Clone)]
pub struct HeatmapSmoother {
  kernel: Box<[f32]>,
  horizontal: Array2<f32>,
}

impl HeatmapSmoother {
  pub fn new(kernel_size: usize, sigma: f32, grid_height: usize, grid_width: usize) -> Self {
    Self {
      kernel: gaussian_kernel(kernel_size, sigma),
      horizontal: Array2::zeros((grid_height, grid_width)),
    }
  }

  pub fn kernel(&self) -> &[f32] {
    &self.kernel
  }

  /// 平滑 `channel` 并写入 `out`，两者形状必须一致
  pub fn smooth_into(&mut self, channel: ArrayView2<'_, f32>, out: &mut Array2<f32>) {
    let (height, width) = channel.dim();
    if self.horizontal.dim() != (height, width) {
      self.horizontal = Array2::zeros((height, width));
    }
    if out.dim() != (height, width) {
      *out = Array2::zeros((height, width));
    }

    let radius = (self.kernel.len() / 2) as isize;

    // 水平方向
    for y in 0..height {
      for x in 0..width {
        let mut acc = 0.0;
        for (k, weight) in self.kernel.iter().enumerate() {
          let sx = reflect_101(x as isize + k as isize - radius, width);
          acc += weight * channel[[y, sx]];
        }
        self.horizontal[[y, x]] = acc;
      }
    }

    // 垂直方向
    for y in 0..height {
      for x in 0..width {
        let mut acc = 0.0;
        for (k, weight) in self.kernel.iter().enumerate() {
          let sy = reflect_101(y as isize + k as isize - radius, height);
          acc += weight * self.horizontal[[sy, x]];
        }
        out[[y, x]] = acc;
      }
    }
  }

  pub fn smooth(&mut self, channel: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = Array2::zeros(channel.dim());
    self.smooth_into(channel, &mut out);
    out
  }
}
