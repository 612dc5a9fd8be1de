// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模型接口与检测结果类型
//!
//! # 架构说明
//!
//! - [`InferenceEngine`]: 推理引擎边界 (输入 NCHW f32 张量, 输出原始张量)
//!   - 生产实现: `OrtBackend` (ONNX Runtime)
//!   - 测试中使用脚本化的假引擎
//! - [`yolov10::YOLOv10Postprocessor`]: 原始输出 → [`Detection`] 列表
//!
//! ```text
//! 原始帧 → Detector 预处理 → [1,3,H,W]
//!          ↓
//!     InferenceEngine::run
//!          ↓
//!     [1, 4+nc, N] → YOLOv10Postprocessor::decode → Vec<Detection>
//! ```
use ndarray::{Array4, ArrayD};

use crate::error::Result;

pub mod yolov10;

pub use yolov10::{YOLOv10Config, YOLOv10Postprocessor};

/// 统一的推理引擎接口
pub trait InferenceEngine {
    /// 模型输入尺寸 (width, height)
    fn input_size(&self) -> (u32, u32);

    /// 同步执行一次前向推理, 返回第一个输出张量
    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        (**self).run(input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bbox {
    // 角点形式, 原图像素坐标
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Bbox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}

/// 过滤后的单个检测结果, 每次推理生成, 用完即弃
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: Bbox,
    pub score: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(bbox: Bbox, score: f32, class_id: usize) -> Self {
        Self {
            bbox,
            score,
            class_id,
        }
    }
}
