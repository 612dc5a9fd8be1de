// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 错误类型 (检测流水线)

use thiserror::Error;

/// 检测流水线的错误分类
///
/// - `Shape` / `Inference` / `UnknownClass`: 单帧致命, 向调用方传播
/// - `Collaborator`: 设置存储/通知等外部协作方失败, 只转换为状态字符串或日志
#[derive(Debug, Error)]
pub enum WatchError {
    /// 推理输出张量形状不符合 (1, 4+nc, N)
    #[error("malformed model output: expected {expected}, got {got:?}")]
    Shape { expected: String, got: Vec<usize> },

    /// 推理引擎调用失败 (模型损坏, provider 不可用等)
    #[error("inference failed: {0}")]
    Inference(String),

    /// 引擎返回的类别超出类别表范围
    #[error("class id {id} out of range for catalog of {len} classes")]
    UnknownClass { id: usize, len: usize },

    /// 设置中出现类别表之外的类别名
    #[error("unknown class name `{0}`")]
    UnknownClassName(String),

    #[error("collaborator call failed: {0}")]
    Collaborator(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WatchError {
    pub fn shape(expected: impl Into<String>, got: &[usize]) -> Self {
        WatchError::Shape {
            expected: expected.into(),
            got: got.to_vec(),
        }
    }
}

impl From<ort::Error> for WatchError {
    fn from(e: ort::Error) -> Self {
        WatchError::Inference(e.to_string())
    }
}

impl From<ureq::Error> for WatchError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                WatchError::Collaborator(format!("HTTP {}: {}", code, body))
            }
            ureq::Error::Transport(t) => WatchError::Collaborator(t.to_string()),
        }
    }
}

pub type Result<T, E = WatchError> = std::result::Result<T, E>;
