// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
/// 帧处理流水线 (Frame Pipeline)
///
/// 单线程同步: 一帧处理完才处理下一帧
/// - Detector:   整帧检测 (不按监视列表预过滤)
/// - 过滤:       监视列表 + 每类动作 (计数 / 通知 / 录像)
/// - Annotator:  只绘制被监视的检测 + 计数叠加
/// - 输出:       RGB, 缩放到固定显示分辨率
pub mod counters;
pub mod processor;

pub use counters::DetectionCounters;
pub use processor::{FrameOutput, FramePipeline, DISPLAY_HEIGHT, DISPLAY_WIDTH};
