// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose/skeleton.rs - 关节与骨架连接表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::Serialize;

use super::NUM_JOINTS;

/// COCO 17 点关节编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum Joint {
  Nose = 0,
  LeftEye = 1,
  RightEye = 2,
  LeftEar = 3,
  RightEar = 4,
  LeftShoulder = 5,
  RightShoulder = 6,
  LeftElbow = 7,
  RightElbow = 8,
  LeftWrist = 9,
  RightWrist = 10,
  LeftHip = 11,
  RightHip = 12,
  LeftKnee = 13,
  RightKnee = 14,
  LeftAnkle = 15,
  RightAnkle = 16,
}

impl Joint {
  pub const ALL: [Joint; NUM_JOINTS] = [
    Joint::Nose,
    Joint::LeftEye,
    Joint::RightEye,
    Joint::LeftEar,
    Joint::RightEar,
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftKnee,
    Joint::RightKnee,
    Joint::LeftAnkle,
    Joint::RightAnkle,
  ];

  pub fn from_index(index: usize) -> Option<Self> {
    Self::ALL.get(index).copied()
  }

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn name(self) -> &'static str {
    match self {
      Joint::Nose => "nose",
      Joint::LeftEye => "left_eye",
      Joint::RightEye => "right_eye",
      Joint::LeftEar => "left_ear",
      Joint::RightEar => "right_ear",
      Joint::LeftShoulder => "left_shoulder",
      Joint::RightShoulder => "right_shoulder",
      Joint::LeftElbow => "left_elbow",
      Joint::RightElbow => "right_elbow",
      Joint::LeftWrist => "left_wrist",
      Joint::RightWrist => "right_wrist",
      Joint::LeftHip => "left_hip",
      Joint::RightHip => "right_hip",
      Joint::LeftKnee => "left_knee",
      Joint::RightKnee => "right_knee",
      Joint::LeftAnkle => "left_ankle",
      Joint::RightAnkle => "right_ankle",
    }
  }
}

pub type SkeletonEdge = (Joint, Joint);

/// 绘制的骨架连接，不含耳朵等头部连线
pub const SKELETON_EDGES: [SkeletonEdge; 13] = [
  (Joint::Nose, Joint::LeftEye),
  (Joint::Nose, Joint::RightEye),
  // 上半身
  (Joint::LeftShoulder, Joint::RightShoulder),
  (Joint::LeftShoulder, Joint::LeftElbow),
  (Joint::LeftElbow, Joint::LeftWrist),
  (Joint::RightShoulder, Joint::RightElbow),
  (Joint::RightElbow, Joint::RightWrist),
  // 躯干
  (Joint::LeftShoulder, Joint::LeftHip),
  (Joint::RightShoulder, Joint::RightHip),
  // 下半身
  (Joint::LeftHip, Joint::LeftKnee),
  (Joint::LeftKnee, Joint::LeftAnkle),
  (Joint::RightHip, Joint::RightKnee),
  (Joint::RightKnee, Joint::RightAnkle),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SkeletonGraph;

impl SkeletonGraph {
  pub fn edges(&self) -> &'static [SkeletonEdge] {
    &SKELETON_EDGES
  }
}
