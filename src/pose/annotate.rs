// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose/annotate.rs - 单帧关键点提取与骨架线段
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::ops::Index;

use ndarray::Array2;
use serde::Serialize;
use tracing::debug;

use super::{
  CoordinateMapper, Heatmap, HeatmapSmoother, Joint, KeypointLocator, NUM_JOINTS, Point,
  PoseConfig, PoseError, SkeletonGraph,
};

/// 模型输入坐标下的关键点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub confidence: f32,
  pub valid: bool,
}

impl Keypoint {
  pub const INVALID: Keypoint = Keypoint {
    x: 0.0,
    y: 0.0,
    confidence: 0.0,
    valid: false,
  };

  pub fn point(&self) -> Point {
    Point::new(self.x, self.y)
  }

  /// 绘制时的判定：两个坐标都严格大于 0
  ///
  /// 与 `valid` 不同，落在图像边缘（x 或 y 为 0）的真实检测也会被当作无效。
  pub fn is_drawable(&self) -> bool {
    self.x > 0.0 && self.y > 0.0
  }
}

/// 一帧的 17 个关键点，按关节编号索引
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeypointSet {
  points: [Keypoint; NUM_JOINTS],
}

impl Default for KeypointSet {
  fn default() -> Self {
    Self {
      points: [Keypoint::INVALID; NUM_JOINTS],
    }
  }
}

impl KeypointSet {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Keypoint> {
    self.points.get(index)
  }

  pub fn iter(&self) -> impl Iterator<Item = (Joint, &Keypoint)> {
    Joint::ALL.into_iter().zip(self.points.iter())
  }

  pub fn valid_count(&self) -> usize {
    self.points.iter().filter(|k| k.valid).count()
  }

  pub fn as_slice(&self) -> &[Keypoint] {
    &self.points
  }
}

impl From<[Keypoint; NUM_JOINTS]> for KeypointSet {
  fn from(points: [Keypoint; NUM_JOINTS]) -> Self {
    Self { points }
  }
}

impl Index<Joint> for KeypointSet {
  type Output = Keypoint;

  fn index(&self, joint: Joint) -> &Self::Output {
    &self.points[joint.index()]
  }
}

impl Index<usize> for KeypointSet {
  type Output = Keypoint;

  fn index(&self, index: usize) -> &Self::Output {
    &self.points[index]
  }
}

/// 骨架线段，坐标在模型输入空间
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
  pub from: Point,
  pub to: Point,
  pub color: [u8; 3],
  pub thickness: u32,
}

impl Segment {
  /// 对两个端点应用同一个变换（例如换算到原始帧坐标）
  pub fn map_points(self, f: impl Fn(Point) -> Point) -> Self {
    Self {
      from: f(self.from),
      to: f(self.to),
      ..self
    }
  }
}

/// 单帧解码结果
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PoseAnnotation {
  pub keypoints: KeypointSet,
  pub segments: Vec<Segment>,
}

/// 单帧解码器
///
/// 平滑用的缓冲区在构造时按网格尺寸分配，之后每帧复用；
/// 多个线程并行解码时每个线程需要各自的实例。
pub struct FrameAnnotator {
  expected_shape: [usize; 3],
  smoother: HeatmapSmoother,
  smoothed: Array2<f32>,
  locator: KeypointLocator,
  mapper: CoordinateMapper,
  skeleton: SkeletonGraph,
  segment_color: [u8; 3],
  segment_thickness: u32,
}

impl FrameAnnotator {
  pub fn new(config: &PoseConfig) -> Self {
    Self {
      expected_shape: config.heatmap_shape(),
      smoother: HeatmapSmoother::new(
        config.kernel_size,
        config.sigma,
        config.grid_height,
        config.grid_width,
      ),
      smoothed: Array2::zeros((config.grid_height, config.grid_width)),
      locator: KeypointLocator::new(config.confidence_floor),
      mapper: CoordinateMapper::new(config.ratio()),
      skeleton: SkeletonGraph,
      segment_color: config.segment_color,
      segment_thickness: config.segment_thickness,
    }
  }

  pub fn mapper(&self) -> &CoordinateMapper {
    &self.mapper
  }

  /// 解码一帧热力图
  ///
  /// 形状不符或含有非有限值时整帧放弃，不返回部分结果。
  pub fn annotate(&mut self, heatmap: &Heatmap) -> Result<PoseAnnotation, PoseError> {
    heatmap.validate(self.expected_shape)?;

    let mut keypoints = KeypointSet::default();
    for joint in Joint::ALL {
      self
        .smoother
        .smooth_into(heatmap.channel(joint.index()), &mut self.smoothed);
      let peak = self.locator.locate(self.smoothed.view());
      let point = self.mapper.to_input_space(peak.x, peak.y);

      debug!(
        "关节 {}: 网格 ({}, {}) -> 输入 ({:.1}, {:.1}), 置信度 {:.4}, 有效 {}",
        joint.name(),
        peak.x,
        peak.y,
        point.x,
        point.y,
        peak.confidence,
        peak.found
      );

      keypoints.points[joint.index()] = Keypoint {
        x: point.x,
        y: point.y,
        confidence: peak.confidence,
        valid: peak.found,
      };
    }

    let segments = self
      .skeleton
      .edges()
      .iter()
      .filter(|&&(a, b)| keypoints[a].is_drawable() && keypoints[b].is_drawable())
      .map(|&(a, b)| Segment {
        from: keypoints[a].point(),
        to: keypoints[b].point(),
        color: self.segment_color,
        thickness: self.segment_thickness,
      })
      .collect();

    Ok(PoseAnnotation {
      keypoints,
      segments,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array3;

  fn heatmap_with(spikes: &[(Joint, usize, usize, f32)]) -> Heatmap {
    let mut data = Array3::<f32>::zeros((NUM_JOINTS, 64, 48));
    for &(joint, y, x, value) in spikes {
      data[[joint.index(), y, x]] = value;
    }
    Heatmap::from_array(data)
  }

  #[test]
  fn single_spike_on_nose_gives_one_valid_keypoint_and_no_segments() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let pose = annotator
      .annotate(&heatmap_with(&[(Joint::Nose, 10, 5, 1.0)]))
      .unwrap();

    let nose = pose.keypoints[Joint::Nose];
    assert!(nose.valid);
    assert_eq!(nose.point(), Point::new(5.0 / 0.25, 10.0 / 0.25));
    assert!(nose.confidence > 0.01);
    for (joint, keypoint) in pose.keypoints.iter().skip(1) {
      assert!(!keypoint.valid, "{} should be invalid", joint.name());
      assert_eq!(*keypoint, Keypoint::INVALID);
    }
    assert_eq!(pose.keypoints.len(), NUM_JOINTS);
    assert!(!pose.keypoints.is_empty());
    assert!(pose.segments.is_empty());
  }

  #[test]
  fn shoulders_alone_produce_exactly_one_segment() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let pose = annotator
      .annotate(&heatmap_with(&[
        (Joint::LeftShoulder, 20, 30, 0.9),
        (Joint::RightShoulder, 20, 18, 0.8),
      ]))
      .unwrap();

    assert_eq!(pose.keypoints.valid_count(), 2);
    assert_eq!(pose.segments.len(), 1);
    let segment = pose.segments[0];
    assert_eq!(segment.from, Point::new(120.0, 80.0));
    assert_eq!(segment.to, Point::new(72.0, 80.0));
    assert_eq!(segment.color, [255, 0, 0]);
    assert_eq!(segment.thickness, 2);
  }

  #[test]
  fn edge_needs_both_endpoints() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let pose = annotator
      .annotate(&heatmap_with(&[(Joint::LeftShoulder, 20, 30, 0.9)]))
      .unwrap();
    assert!(pose.segments.is_empty());
  }

  #[test]
  fn detection_on_the_border_is_valid_but_not_drawn() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let pose = annotator
      .annotate(&heatmap_with(&[
        (Joint::LeftShoulder, 0, 30, 0.9),
        (Joint::RightShoulder, 20, 18, 0.9),
      ]))
      .unwrap();

    let left = pose.keypoints[Joint::LeftShoulder];
    assert!(left.valid);
    assert!(!left.is_drawable());
    assert!(pose.segments.is_empty());
  }

  #[test]
  fn full_body_draws_every_edge_in_table_order() {
    let spikes: Vec<(Joint, usize, usize, f32)> = Joint::ALL
      .iter()
      .map(|&j| (j, 5 + 3 * j.index(), 4 + 2 * j.index(), 0.7))
      .collect();
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let pose = annotator.annotate(&heatmap_with(&spikes)).unwrap();

    assert_eq!(pose.keypoints.valid_count(), NUM_JOINTS);
    assert_eq!(pose.segments.len(), SkeletonGraph.edges().len());
    for (segment, &(a, b)) in pose.segments.iter().zip(SkeletonGraph.edges()) {
      assert_eq!(segment.from, pose.keypoints[a].point());
      assert_eq!(segment.to, pose.keypoints[b].point());
    }
  }

  #[test]
  fn wrong_grid_size_aborts_the_frame() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let heatmap = Heatmap::from_array(Array3::zeros((NUM_JOINTS, 32, 24)));
    let err = annotator.annotate(&heatmap).unwrap_err();
    assert!(matches!(err, PoseError::InvalidHeatmapShape { .. }));
  }

  #[test]
  fn non_finite_value_aborts_the_frame() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let heatmap = heatmap_with(&[(Joint::LeftKnee, 3, 3, f32::NAN)]);
    let err = annotator.annotate(&heatmap).unwrap_err();
    assert!(matches!(err, PoseError::NonFiniteHeatmap { joint: 13, .. }));
  }

  #[test]
  fn annotator_is_reusable_across_frames() {
    let mut annotator = FrameAnnotator::new(&PoseConfig::default());
    let first = annotator
      .annotate(&heatmap_with(&[(Joint::LeftWrist, 30, 30, 1.0)]))
      .unwrap();
    let second = annotator.annotate(&heatmap_with(&[])).unwrap();
    let third = annotator
      .annotate(&heatmap_with(&[(Joint::LeftWrist, 30, 30, 1.0)]))
      .unwrap();

    assert_eq!(second.keypoints.valid_count(), 0);
    assert_eq!(first, third);
  }

  #[test]
  fn keypoint_set_serializes_as_array() {
    let json = serde_json::to_value(KeypointSet::default()).unwrap();
    let array = json.as_array().unwrap();
    assert_eq!(array.len(), NUM_JOINTS);
    assert_eq!(array[0]["valid"], false);
  }
}
