// 该文件是 Guji （骨迹） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::marker::PhantomData;

use crate::{frame::PoseInputTensor, pose::Heatmap};

/// 推理接口，对调用方是不透明的同步函数
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 输入为 `[1, 3, 256, 192]`，输出为 `[17, 64, 48]` 热力图的姿态模型
pub trait PoseModel: Model<Input = PoseInputTensor, Output = Heatmap> {}

impl<M: Model<Input = PoseInputTensor, Output = Heatmap>> PoseModel for M {}

/// 用闭包充当模型
pub struct FnModel<F, E> {
  f: F,
  _phantom: PhantomData<fn() -> E>,
}

impl<F, E> FnModel<F, E>
where
  F: Fn(&PoseInputTensor) -> Result<Heatmap, E>,
{
  pub fn new(f: F) -> Self {
    Self {
      f,
      _phantom: PhantomData,
    }
  }
}

impl<F, E> Model for FnModel<F, E>
where
  F: Fn(&PoseInputTensor) -> Result<Heatmap, E>,
{
  type Input = PoseInputTensor;
  type Output = Heatmap;
  type Error = E;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (self.f)(input)
  }
}

impl<M: Model + ?Sized> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxPose, OnnxPoseBuilder, OnnxPoseError};

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array3;

  #[test]
  fn closure_model_sees_the_input_tensor() {
    let model = FnModel::new(|input: &PoseInputTensor| {
      let mut data = Array3::<f32>::zeros((17, 64, 48));
      data[[0, 0, 0]] = input.as_nchw()[0];
      Ok::<_, std::convert::Infallible>(Heatmap::from_array(data))
    });

    let heatmap = model.infer(&PoseInputTensor::default()).unwrap();
    assert_eq!(heatmap.shape(), [17, 64, 48]);
    assert_eq!(heatmap.channel(0)[[0, 0]], 0.0);
  }

  #[test]
  fn references_to_models_are_models() {
    fn run<M: PoseModel>(model: M) -> Heatmap
    where
      M::Error: std::fmt::Debug,
    {
      model.infer(&PoseInputTensor::default()).unwrap()
    }

    let model = FnModel::new(|_: &PoseInputTensor| {
      Ok::<_, String>(Heatmap::from_array(Array3::zeros((17, 64, 48))))
    });
    assert_eq!(run(&model).shape(), [17, 64, 48]);
    assert_eq!(run(model).shape(), [17, 64, 48]);
  }
}
