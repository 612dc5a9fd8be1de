// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - Detector: 预处理 + 推理 + 后处理, 输出原图坐标系下的检测框
pub mod detector;

pub use detector::Detector;
