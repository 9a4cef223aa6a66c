// 该文件是 Guji （骨迹） 项目的一部分。
// src/output/draw.rs - 骨架可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::{pose::Segment, task::PoseFrame};

pub struct Draw {
  /// 关键点圆点半径，`None` 时只画骨架线
  joint_radius: Option<i32>,
  joint_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      joint_radius: None,
      joint_color: [0, 255, 0], // 绿色
    }
  }
}

impl Draw {
  pub fn with_joints(mut self, radius: i32) -> Self {
    self.joint_radius = Some(radius);
    self
  }

  // 粗线用多条平行线近似：偏水平的线沿 y 方向平移，偏竖直的沿 x 方向
  fn draw_segment(&self, image: &mut RgbImage, segment: &Segment) {
    let color = Rgb(segment.color);
    let thickness = segment.thickness.max(1) as i32;
    let horizontal =
      (segment.to.x - segment.from.x).abs() >= (segment.to.y - segment.from.y).abs();

    for i in 0..thickness {
      let offset = (i - (thickness - 1) / 2) as f32;
      let (ox, oy) = if horizontal { (0.0, offset) } else { (offset, 0.0) };
      draw_line_segment_mut(
        image,
        (segment.from.x + ox, segment.from.y + oy),
        (segment.to.x + ox, segment.to.y + oy),
        color,
      );
    }
  }
}

pub trait DrawPoseOnImage {
  fn draw_pose_on_image(&self, image: &mut RgbImage, pose: &PoseFrame);
}

impl DrawPoseOnImage for Draw {
  fn draw_pose_on_image(&self, image: &mut RgbImage, pose: &PoseFrame) {
    for segment in pose.source_segments() {
      self.draw_segment(image, &segment);
    }

    if let Some(radius) = self.joint_radius {
      for (_, point) in pose.source_keypoints() {
        draw_filled_circle_mut(
          image,
          (point.x.round() as i32, point.y.round() as i32),
          radius,
          Rgb(self.joint_color),
        );
      }
    }
  }
}

pub trait DrawPoseOnFrame {
  fn draw_pose(&self, frame: &RgbImage, pose: &PoseFrame) -> RgbImage;
}

impl<D: DrawPoseOnImage> DrawPoseOnFrame for D {
  fn draw_pose(&self, frame: &RgbImage, pose: &PoseFrame) -> RgbImage {
    let mut image = frame.clone();
    self.draw_pose_on_image(&mut image, pose);
    image
  }
}

/// 关键点以 JSON 形式保存在图像旁边
pub struct Record;

impl Record {
  pub fn record(&self, pose: &PoseFrame, path: &std::path::Path) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(pose)?;
    std::fs::write(path.with_extension("json"), json)?;
    Ok(())
  }
}
