// 该文件是 Guji （骨迹） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 姿态模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::PoseInputTensor,
  model::Model,
  pose::{Heatmap, PoseError},
  url_path, url_query,
};

#[derive(Error, Debug)]
pub enum OnnxPoseError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("输出错误: {0}")]
  OutputError(#[from] PoseError),
}

pub struct OnnxPoseBuilder {
  model_path: String,
  threads: usize,
}

impl FromUrlWithScheme for OnnxPoseBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxPoseBuilder {
  type Error = OnnxPoseError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxPoseError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let threads = match url_query::<usize>(url, "threads") {
      Some(Ok(threads)) => threads,
      Some(Err(raw)) => {
        return Err(OnnxPoseError::ModelPathError(format!("无效的线程数: {}", raw)));
      }
      None => 1,
    };

    Ok(OnnxPoseBuilder {
      model_path: url_path(url),
      threads,
    })
  }
}

impl OnnxPoseBuilder {
  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  pub fn build(self) -> Result<OnnxPose, OnnxPoseError> {
    info!("加载模型文件: {}", self.model_path);
    if !std::path::Path::new(&self.model_path).exists() {
      return Err(OnnxPoseError::ModelPathError(format!(
        "模型文件不存在: {}",
        self.model_path
      )));
    }

    let session = Session::builder()
      .map_err(|e| OnnxPoseError::ModelLoadError(format!("无法创建会话: {e}")))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| OnnxPoseError::ModelLoadError(format!("无法设置优化级别: {e}")))?
      .with_intra_threads(self.threads)
      .map_err(|e| OnnxPoseError::ModelLoadError(format!("无法设置线程数: {e}")))?
      .commit_from_file(&self.model_path)
      .map_err(|e| OnnxPoseError::ModelLoadError(format!("无法加载模型: {e}")))?;

    let input_name = session
      .inputs
      .first()
      .map(|i| i.name.clone())
      .unwrap_or_else(|| "input".to_string());
    let output_name = session
      .outputs
      .first()
      .map(|o| o.name.clone())
      .ok_or_else(|| OnnxPoseError::ModelLoadError("模型没有输出".to_string()))?;

    debug!("模型输入: {}, 输出: {}", input_name, output_name);
    info!("模型加载完成");

    Ok(OnnxPose {
      session: Mutex::new(session),
      input_name,
      output_name,
    })
  }
}

/// 导出为 ONNX 的 `pose_hrnet_w32_256x192`
pub struct OnnxPose {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
}

impl Model for OnnxPose {
  type Input = PoseInputTensor;
  type Output = Heatmap;
  type Error = OnnxPoseError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let view = input.as_array_view();
    let tensor = TensorRef::from_array_view(view)
      .map_err(|e| OnnxPoseError::InferenceError(format!("无法创建输入张量: {e}")))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxPoseError::InferenceError("会话锁已损坏".to_string()))?;

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(|e| OnnxPoseError::InferenceError(format!("推理失败: {e}")))?;

    let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
      OnnxPoseError::InferenceError(format!("找不到输出 '{}'", self.output_name))
    })?;

    let (shape, data) = output
      .try_extract_tensor::<f32>()
      .map_err(|e| OnnxPoseError::InferenceError(format!("无法读取输出: {e}")))?;

    let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    debug!("模型输出形状: {:?}", shape);

    Ok(Heatmap::from_shape_vec(&shape, data.to_vec())?)
  }
}
