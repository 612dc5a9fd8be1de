// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端

use std::path::PathBuf;
use std::time::Instant;

use ndarray::{Array4, ArrayD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::error::{Result, WatchError};
use crate::models::InferenceEngine;

/// 动态维度时使用的默认输入尺寸
pub const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub intra_threads: usize,
    /// 模型输入为动态尺寸时使用 (width, height)
    pub image_size: (Option<u32>, Option<u32>),
}

impl OrtConfig {
    pub fn new(f: impl Into<PathBuf>) -> Self {
        Self {
            f: f.into(),
            intra_threads: 4,
            image_size: (None, None),
        }
    }
}

/// ONNX Runtime 会话 + 在构造时解析出的输入/输出元数据
pub struct OrtBackend {
    session: Session,
    input_name: String,
    output_name: String,
    width: u32,
    height: u32,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let t = Instant::now();
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&config.f)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| WatchError::Inference("model has no inputs".into()))?;
        let output = session
            .outputs
            .first()
            .ok_or_else(|| WatchError::Inference("model has no outputs".into()))?;

        // NCHW: [batch, 3, height, width]
        let dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|shape| shape.iter().copied().collect())
            .ok_or_else(|| WatchError::Inference(format!("input `{}` is not a tensor", input.name)))?;
        if dims.len() != 4 {
            return Err(WatchError::Inference(format!(
                "expected 4D input, got {:?}",
                dims
            )));
        }
        let height = Self::resolve_dim(dims[2], config.image_size.1);
        let width = Self::resolve_dim(dims[3], config.image_size.0);

        let input_name = input.name.clone();
        let output_name = output.name.clone();

        info!(
            model = %config.f.display(),
            input = %input_name,
            output = %output_name,
            width,
            height,
            elapsed_ms = t.elapsed().as_secs_f64() * 1000.0,
            "model loaded"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            width,
            height,
        })
    }

    fn resolve_dim(dim: i64, fallback: Option<u32>) -> u32 {
        if dim > 0 {
            dim as u32
        } else {
            fallback.unwrap_or(DEFAULT_INPUT_SIZE)
        }
    }
}

impl InferenceEngine for OrtBackend {
    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let t = Instant::now();
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])?;
        let y = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_owned();
        debug!(
            elapsed_ms = t.elapsed().as_secs_f64() * 1000.0,
            shape = ?y.shape(),
            "inference"
        );
        Ok(y)
    }
}
