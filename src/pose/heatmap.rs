// 该文件是 Guji （骨迹） 项目的一部分。
// src/pose/heatmap.rs - 关节热力图
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ndarray::{Array3, ArrayView2, Axis};

use super::PoseError;

/// 单个关节的二维只读视图 `[grid_height, grid_width]`
pub type JointChannel<'a> = ArrayView2<'a, f32>;

/// 模型输出的热力图 `[joints, grid_height, grid_width]`
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
  data: Array3<f32>,
}

impl Heatmap {
  pub fn from_array(data: Array3<f32>) -> Self {
    Self { data }
  }

  /// 从推理输出的扁平数据构造
  ///
  /// 允许带一个大小为 1 的批次维度（`[1, J, H, W]`）。
  pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, PoseError> {
    let len = data.len();
    let invalid = || PoseError::MalformedTensor {
      shape: shape.to_vec(),
      len,
    };

    let dims = match shape {
      [j, h, w] => (*j, *h, *w),
      [1, j, h, w] => (*j, *h, *w),
      _ => return Err(invalid()),
    };

    Array3::from_shape_vec(dims, data)
      .map(Self::from_array)
      .map_err(|_| invalid())
  }

  pub fn num_joints(&self) -> usize {
    self.data.len_of(Axis(0))
  }

  pub fn grid_height(&self) -> usize {
    self.data.len_of(Axis(1))
  }

  pub fn grid_width(&self) -> usize {
    self.data.len_of(Axis(2))
  }

  pub fn shape(&self) -> [usize; 3] {
    [self.num_joints(), self.grid_height(), self.grid_width()]
  }

  pub fn channel(&self, joint: usize) -> JointChannel<'_> {
    self.data.index_axis(Axis(0), joint)
  }

  pub fn as_array(&self) -> &Array3<f32> {
    &self.data
  }

  /// 检查形状与数值，任何违例都说明推理端违反了约定
  pub fn validate(&self, expected: [usize; 3]) -> Result<(), PoseError> {
    if self.shape() != expected {
      return Err(PoseError::InvalidHeatmapShape {
        expected,
        actual: self.shape().to_vec(),
      });
    }

    if let Some(((joint, y, x), value)) = self.data.indexed_iter().find(|(_, v)| !v.is_finite()) {
      return Err(PoseError::NonFiniteHeatmap {
        joint,
        x,
        y,
        value: *value,
      });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_shape_vec_accepts_batch_dimension() {
    let heatmap = Heatmap::from_shape_vec(&[1, 17, 64, 48], vec![0.0; 17 * 64 * 48]).unwrap();
    assert_eq!(heatmap.shape(), [17, 64, 48]);
  }

  #[test]
  fn from_shape_vec_rejects_length_mismatch() {
    let err = Heatmap::from_shape_vec(&[17, 64, 48], vec![0.0; 10]).unwrap_err();
    assert_eq!(
      err,
      PoseError::MalformedTensor {
        shape: vec![17, 64, 48],
        len: 10,
      }
    );

    let err = Heatmap::from_shape_vec(&[2, 17, 64, 48], vec![0.0; 2 * 17 * 64 * 48]).unwrap_err();
    assert!(matches!(err, PoseError::MalformedTensor { .. }));
  }

  #[test]
  fn validate_reports_wrong_joint_count() {
    let heatmap = Heatmap::from_array(Array3::zeros((16, 64, 48)));
    let err = heatmap.validate([17, 64, 48]).unwrap_err();
    assert_eq!(
      err,
      PoseError::InvalidHeatmapShape {
        expected: [17, 64, 48],
        actual: vec![16, 64, 48],
      }
    );
  }

  #[test]
  fn validate_reports_first_non_finite_cell() {
    let mut data = Array3::zeros((17, 64, 48));
    data[[3, 7, 9]] = f32::NAN;
    data[[4, 0, 0]] = f32::INFINITY;
    let err = Heatmap::from_array(data).validate([17, 64, 48]).unwrap_err();
    match err {
      PoseError::NonFiniteHeatmap { joint, x, y, .. } => {
        assert_eq!((joint, x, y), (3, 9, 7));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn channel_is_a_view_of_one_joint() {
    let mut data = Array3::zeros((17, 64, 48));
    data[[2, 5, 6]] = 0.5;
    let heatmap = Heatmap::from_array(data);
    let channel = heatmap.channel(2);
    assert_eq!(channel.dim(), (64, 48));
    assert_eq!(channel[[5, 6]], 0.5);
    assert_eq!(heatmap.channel(1)[[5, 6]], 0.0);
  }
}
