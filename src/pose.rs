// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose.rs - 热力图解码与骨架
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # 姿态热力图解码
//!
//! 模型对每个关节输出一张 `[64, 48]` 的置信度热力图。本模块负责：
//!
//! 1. 用 3x3 高斯核平滑每个关节通道，抑制孤立噪点；
//! 2. 行优先扫描找出置信度最大的格子（低于置信度下限视为未检测到）；
//! 3. 把网格坐标换算到模型输入图像坐标；
//! 4. 按固定骨架表输出可绘制的线段。
//!
//! ```
//! use guji::pose::{FrameAnnotator, Heatmap, Joint, PoseConfig};
//!
//! let config = PoseConfig::default();
//! let mut data = ndarray::Array3::<f32>::zeros(config.heatmap_shape());
//! data[[Joint::Nose as usize, 10, 5]] = 1.0;
//!
//! let mut annotator = FrameAnnotator::new(&config);
//! let pose = annotator.annotate(&Heatmap::from_array(data)).unwrap();
//! assert!(pose.keypoints[Joint::Nose].valid);
//! assert!(pose.segments.is_empty());
//! ```

use thiserror::Error;

mod annotate;
mod heatmap;
mod locate;
mod mapper;
mod skeleton;
mod smooth;

pub use self::annotate::{FrameAnnotator, Keypoint, KeypointSet, PoseAnnotation, Segment};
pub use self::heatmap::{Heatmap, JointChannel};
pub use self::locate::{GridPeak, KeypointLocator};
pub use self::mapper::{CoordinateMapper, Point, to_source_space};
pub use self::skeleton::{Joint, SKELETON_EDGES, SkeletonEdge, SkeletonGraph};
pub use self::smooth::{HeatmapSmoother, gaussian_kernel};

/// 关节数量（COCO 17 点）
pub const NUM_JOINTS: usize = 17;
/// 模型输入宽度
pub const MODEL_INPUT_WIDTH: u32 = 192;
/// 模型输入高度
pub const MODEL_INPUT_HEIGHT: u32 = 256;
/// 热力图网格宽度
pub const HEATMAP_GRID_WIDTH: usize = 48;
/// 热力图网格高度
pub const HEATMAP_GRID_HEIGHT: usize = 64;
/// 默认置信度下限
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.01;
/// 默认采样间隔（毫秒）
pub const DEFAULT_SAMPLING_STEP_MS: u64 = 33;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
  #[error("热力图形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  InvalidHeatmapShape {
    expected: [usize; 3],
    actual: Vec<usize>,
  },
  #[error("推理输出无法解释为热力图: 形状 {shape:?}, 数据长度 {len}")]
  MalformedTensor { shape: Vec<usize>, len: usize },
  #[error("热力图包含非有限值: 关节 {joint}, 位置 ({x}, {y}), 值 {value}")]
  NonFiniteHeatmap {
    joint: usize,
    x: usize,
    y: usize,
    value: f32,
  },
}

/// 热力图解码配置
///
/// `Default` 对应 `pose_hrnet_w32_256x192` 模型。
#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfig {
  pub grid_height: usize,
  pub grid_width: usize,
  pub input_height: u32,
  pub input_width: u32,
  pub confidence_floor: f32,
  pub kernel_size: usize,
  pub sigma: f32,
  pub segment_color: [u8; 3],
  pub segment_thickness: u32,
}

impl Default for PoseConfig {
  fn default() -> Self {
    Self {
      grid_height: HEATMAP_GRID_HEIGHT,
      grid_width: HEATMAP_GRID_WIDTH,
      input_height: MODEL_INPUT_HEIGHT,
      input_width: MODEL_INPUT_WIDTH,
      confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
      kernel_size: 3,
      sigma: 1.0,
      segment_color: [255, 0, 0], // 红色
      segment_thickness: 2,
    }
  }
}

impl PoseConfig {
  pub fn with_confidence_floor(mut self, floor: f32) -> Self {
    self.confidence_floor = floor;
    self
  }

  /// 输出网格与输入图像的比例，两个方向共用
  pub fn ratio(&self) -> f32 {
    self.grid_width as f32 / self.input_width as f32
  }

  pub fn heatmap_shape(&self) -> [usize; 3] {
    [NUM_JOINTS, self.grid_height, self.grid_width]
  }

  pub fn input_size(&self) -> (u32, u32) {
    (self.input_width, self.input_height)
  }
}
