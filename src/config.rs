// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 命令行参数 + 流水线配置文件

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// 检测流水线参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "watchcam - 目标检测与监视流水线", long_about = None)]
pub struct Args {
    /// ONNX 模型路径 (YOLOv10)
    #[arg(short, long, default_value = "models/yolov10n.onnx")]
    pub model: PathBuf,

    /// 输入: 单张图片或图片目录
    #[arg(short, long)]
    pub source: PathBuf,

    /// 标注结果输出目录
    #[arg(short, long, default_value = "runs")]
    pub output: PathBuf,

    /// 置信度阈值, 未指定时使用配置文件中的值
    #[arg(long)]
    pub conf: Option<f32>,

    /// 流水线配置文件, 不存在时创建默认配置
    #[arg(long, default_value = "watchcam.json")]
    pub config: PathBuf,

    /// 本地偏好文件 (优先于远端偏好存储)
    #[arg(long)]
    pub prefs_file: Option<PathBuf>,

    /// 远端偏好读取地址
    #[arg(long, default_value = "YOUR_GET_USER_PREFERENCES_FUNCTION_URL")]
    pub prefs_load_url: String,

    /// 远端偏好保存地址
    #[arg(long, default_value = "YOUR_SET_USER_PREFERENCES_FUNCTION_URL")]
    pub prefs_save_url: String,

    /// 邮件通知地址
    #[arg(long, default_value = "YOUR_SEND_EMAIL_NOTIFICATION_FUNCTION_URL")]
    pub email_url: String,

    /// 调用远端函数时使用的 Bearer token
    #[arg(long, default_value = "")]
    pub token: String,

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// ONNX Runtime intra-op 线程数
    #[arg(long, default_value_t = 4)]
    pub threads: usize,
}

/// 地址为空或仍是 `YOUR_...` 占位符
pub fn is_placeholder_endpoint(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url.starts_with("YOUR_")
}

/// 通知策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// 每个符合条件的检测框通知一次 (同一帧同一类别的多个框会重复通知)
    #[default]
    PerDetection,
    /// 同一帧内每个类别最多通知一次
    PerClassPerFrame,
}

/// 流水线配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 输出 ===
    pub display_width: u32,  // 输出画面宽
    pub display_height: u32, // 输出画面高

    // === 检测 ===
    pub confidence_threshold: f32, // 默认置信度阈值
    pub nms_iou: Option<f32>,      // 可选去重 IoU 阈值, 默认关闭

    // === 标注 ===
    pub font: Option<PathBuf>,

    // === 通知 ===
    pub notify_policy: NotifyPolicy,
    pub notification_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            display_width: 640,
            display_height: 480,
            confidence_threshold: 0.3,
            nms_iou: None,
            font: None,
            notify_policy: NotifyPolicy::PerDetection,
            notification_timeout_secs: 10,
        }
    }
}

impl PipelineConfig {
    /// 从 JSON 文件加载配置; 文件不存在时写入默认配置, 解析失败时使用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!(path = %path.display(), "pipeline config loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid pipeline config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "pipeline config not found, creating default");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!(path = %path.display(), error = %e, "failed to write default config");
                }
                config
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "pipeline config saved");
        Ok(())
    }
}
