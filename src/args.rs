// 该文件是 Guji （骨迹） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use url::Url;

use guji::pose::{DEFAULT_CONFIDENCE_FLOOR, DEFAULT_SAMPLING_STEP_MS};

/// Guji 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 姿态模型路径，例如 onnx:///models/pose_hrnet_w32_256x192.onnx?threads=4
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 单张图片: image:///path/to/frame.png?duration=1000
  /// - 视频抽帧目录: frames:///path/to/frames?fps=30
  /// - 视频文件（需要 gstreamer_input 特性）: gst://file/path/to/clip.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 叠加图像: image:///path/to/out.png
  /// - 逐帧记录: folder:///path/to/dir?always
  /// - 关键点序列: jsonl:///path/to/series.jsonl
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 采样间隔（毫秒）
  #[arg(long, default_value_t = DEFAULT_SAMPLING_STEP_MS, value_name = "MILLIS")]
  pub step_ms: u64,

  /// 关键点置信度下限
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_FLOOR, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 最多处理的时间戳个数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_follow_pose_config() {
    let args = Args::try_parse_from([
      "guji",
      "--model",
      "onnx:///m.onnx",
      "--input",
      "frames:///tmp/clip",
      "--output",
      "jsonl:///tmp/out.jsonl",
    ])
    .unwrap();
    assert_eq!(args.step_ms, 33);
    assert_eq!(args.confidence, 0.01);
    assert_eq!(args.frame_number, None);
    assert_eq!(args.input.scheme(), "frames");
  }
}
