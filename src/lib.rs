// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod catalog; // 类别表 (名称 + 颜色)
pub mod config; // 命令行参数与流水线配置
pub mod detection; // 检测器
pub mod error; // 错误类型
pub mod frame; // 视频帧
pub mod models; // 推理引擎接口与后处理
pub mod notify; // 通知与录像触发
pub mod ort_backend;
pub mod pipeline; // 帧处理流水线
pub mod renderer; // 标注渲染
pub mod settings; // 监视设置与偏好存储
pub mod utils;

pub use crate::catalog::ClassCatalog;
pub use crate::config::{Args, NotifyPolicy, PipelineConfig};
pub use crate::detection::Detector;
pub use crate::error::{Result, WatchError};
pub use crate::frame::{ChannelOrder, Frame};
pub use crate::models::{Bbox, Detection, InferenceEngine, YOLOv10Config, YOLOv10Postprocessor};
pub use crate::notify::{HttpEmailNotifier, LogNotifier, LogRecordTrigger, Notifier, RecordTrigger};
pub use crate::ort_backend::{OrtBackend, OrtConfig};
pub use crate::pipeline::{DetectionCounters, FrameOutput, FramePipeline};
pub use crate::renderer::Annotator;
pub use crate::settings::{
    HttpPreferenceStore, JsonFilePreferenceStore, PreferenceStore, SettingsService,
    SharedWatchConfig, WatchConfiguration,
};

/// 带分隔符的本地时间字符串, 用作输出文件名
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
