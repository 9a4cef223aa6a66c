// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose/locate.rs - 关节峰值定位
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::ArrayView2;

/// 网格坐标下的峰值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPeak {
  pub x: usize,
  pub y: usize,
  pub confidence: f32,
  pub found: bool,
}

impl GridPeak {
  pub const NOT_FOUND: GridPeak = GridPeak {
    x: 0,
    y: 0,
    confidence: 0.0,
    found: false,
  };
}

#[derive(Debug, Clone, Copy)]
pub struct KeypointLocator {
  confidence_floor: f32,
}

impl KeypointLocator {
  pub fn new(confidence_floor: f32) -> Self {
    Self { confidence_floor }
  }

  pub fn confidence_floor(&self) -> f32 {
    self.confidence_floor
  }

  /// 行优先扫描，返回第一个取得最大值的格子
  ///
  /// 只有 `>= confidence_floor` 的格子才参与比较，且必须严格大于当前最大值；
  /// 最大值从 0 开始，整张图都低于下限时返回 [`GridPeak::NOT_FOUND`]。
  pub fn locate(&self, channel: ArrayView2<'_, f32>) -> GridPeak {
    let mut peak = GridPeak::NOT_FOUND;

    for ((y, x), &value) in channel.indexed_iter() {
      if value >= self.confidence_floor && value > peak.confidence {
        peak = GridPeak {
          x,
          y,
          confidence: value,
          found: true,
        };
      }
    }

    peak
  }
}
