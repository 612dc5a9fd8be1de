// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器 (Detector)
//! 职责: 帧 → 预处理 → 推理引擎 → YOLOv10 后处理 → Vec<Detection>

use std::time::Instant;

use fast_image_resize as fr;
use ndarray::Array4;
use tracing::debug;

use crate::catalog::ClassCatalog;
use crate::error::{Result, WatchError};
use crate::frame::{ChannelOrder, Frame};
use crate::models::{Detection, InferenceEngine, YOLOv10Postprocessor};
use crate::renderer::Annotator;

pub struct Detector<E> {
    engine: E,
    postprocessor: YOLOv10Postprocessor,
    resizer: fr::Resizer,
}

impl<E: InferenceEngine> Detector<E> {
    pub fn new(engine: E, postprocessor: YOLOv10Postprocessor) -> Self {
        Self {
            engine,
            postprocessor,
            resizer: fr::Resizer::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// 单帧检测
    ///
    /// 返回的框位于 *原始* 帧 (缩放前) 的像素坐标系
    pub fn detect(&mut self, frame: &Frame, conf: f32) -> Result<Vec<Detection>> {
        let (width_original, height_original) = (frame.width(), frame.height());

        let t_pre = Instant::now();
        let xs = self.preprocess(frame)?;
        let preprocess_ms = t_pre.elapsed().as_secs_f64() * 1000.0;

        let t_run = Instant::now();
        let ys = self.engine.run(xs)?;
        let inference_ms = t_run.elapsed().as_secs_f64() * 1000.0;

        let t_post = Instant::now();
        let detections =
            self.postprocessor
                .decode(ys.view(), conf, width_original, height_original)?;
        let postprocess_ms = t_post.elapsed().as_secs_f64() * 1000.0;

        debug!(
            preprocess_ms,
            inference_ms,
            postprocess_ms,
            detections = detections.len(),
            "detect"
        );
        Ok(detections)
    }

    /// 检测并绘制全部结果 (不经过监视列表过滤)
    ///
    /// class_id 超出类别表时返回 `UnknownClass`, 不会静默绘制
    pub fn detect_annotated(
        &mut self,
        frame: &Frame,
        conf: f32,
        annotator: &Annotator,
        catalog: &ClassCatalog,
    ) -> Result<(Frame, Vec<Detection>)> {
        let detections = self.detect(frame, conf)?;
        for det in &detections {
            catalog.name(det.class_id)?;
        }
        let annotated = annotator.annotate(frame, &detections, catalog);
        Ok((annotated, detections))
    }

    /// RGB 顺序 → 缩放到模型输入尺寸 → 归一化到 [0, 1] → NCHW
    fn preprocess(&mut self, frame: &Frame) -> Result<Array4<f32>> {
        let (width, height) = self.engine.input_size();
        let rgb = frame.clone().into_order(ChannelOrder::Rgb);

        let src = fr::images::Image::from_vec_u8(
            rgb.width(),
            rgb.height(),
            rgb.into_data(),
            fr::PixelType::U8x3,
        )
        .map_err(|e| WatchError::Inference(format!("invalid source frame: {}", e)))?;
        let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x3);
        self.resizer
            .resize(
                &src,
                &mut dst,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )
            .map_err(|e| WatchError::Inference(format!("resize failed: {}", e)))?;

        let (w, h) = (width as usize, height as usize);
        let mut xs = Array4::<f32>::zeros((1, 3, h, w));
        for (idx, px) in dst.buffer().chunks_exact(3).enumerate() {
            let (y, x) = (idx / w, idx % w);
            xs[[0, 0, y, x]] = px[0] as f32 / 255.0;
            xs[[0, 1, y, x]] = px[1] as f32 / 255.0;
            xs[[0, 2, y, x]] = px[2] as f32 / 255.0;
        }
        Ok(xs)
    }
}
