// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose/mapper.rs - 坐标换算
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 网格坐标 -> 模型输入坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
  ratio: f32,
}

impl CoordinateMapper {
  /// `ratio` 为输出网格宽度 / 输入图像宽度
  pub fn new(ratio: f32) -> Self {
    Self { ratio }
  }

  pub fn from_sizes(grid_width: usize, input_width: u32) -> Self {
    Self::new(grid_width as f32 / input_width as f32)
  }

  pub fn ratio(&self) -> f32 {
    self.ratio
  }

  pub fn to_input_space(&self, grid_x: usize, grid_y: usize) -> Point {
    Point {
      x: grid_x as f32 / self.ratio,
      y: grid_y as f32 / self.ratio,
    }
  }

  pub fn to_grid_space(&self, point: Point) -> (f32, f32) {
    (point.x * self.ratio, point.y * self.ratio)
  }
}

/// 模型输入坐标 -> 原始帧坐标，两个方向分别缩放
pub fn to_source_space(point: Point, input_size: (u32, u32), source_size: (u32, u32)) -> Point {
  let sx = source_size.0 as f32 / input_size.0 as f32;
  let sy = source_size.1 as f32 / input_size.1 as f32;
  Point {
    x: point.x * sx,
    y: point.y * sy,
  }
}
