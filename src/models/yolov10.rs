// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv10 后处理 (NMS-Free端到端检测)
// 输出格式: [1, 4+nc, N], 几何量 (cx, cy, w, h) 已归一化到 [0, 1]

use ndarray::{s, ArrayViewD, Axis, Ix2};
use tracing::debug;

use crate::error::{Result, WatchError};
use crate::models::Detection;
use crate::utils::{non_max_suppression, to_pixel_corners};

const CXYWH_OFFSET: usize = 4;

/// YOLOv10 后处理配置
#[derive(Debug, Clone, Default)]
pub struct YOLOv10Config {
    /// 可选 NMS IoU 阈值
    ///
    /// YOLOv10 在训练阶段已经学会去重, 默认不做 NMS.
    /// 换成需要 NMS 的检测头时设置该值, 在坐标变换之后按 (class_id, IoU) 去重.
    pub iou: Option<f32>,
}

/// YOLOv10 后处理器
#[derive(Debug, Clone, Default)]
pub struct YOLOv10Postprocessor {
    config: YOLOv10Config,
}

impl YOLOv10Postprocessor {
    pub fn new(config: YOLOv10Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YOLOv10Config {
        &self.config
    }

    /// 原始输出 → 检测结果
    ///
    /// - 每行置信度 = 各类别分数的最大值, class_id = 最大值下标
    /// - 仅保留置信度 *严格大于* `conf` 的行
    /// - `width`/`height` 是缩放前原图的尺寸
    pub fn decode(
        &self,
        output: ArrayViewD<f32>,
        conf: f32,
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= CXYWH_OFFSET {
            return Err(WatchError::shape("[1, 4+nc, N] with nc >= 1", shape));
        }

        // [1, 4+nc, N] → [N, 4+nc]
        let preds = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|_| WatchError::shape("[1, 4+nc, N]", shape))?
            .reversed_axes();

        let mut kept = Vec::new();
        let mut scores = Vec::new();
        let mut class_ids = Vec::new();
        for (idx, pred) in preds.axis_iter(Axis(0)).enumerate() {
            let clss = pred.slice(s![CXYWH_OFFSET..]);
            let mut best = (0usize, f32::NEG_INFINITY);
            for (id, &score) in clss.iter().enumerate() {
                if score > best.1 {
                    best = (id, score);
                }
            }
            if best.1 > conf {
                kept.push(idx);
                class_ids.push(best.0);
                scores.push(best.1);
            }
        }

        if kept.is_empty() {
            return Ok(Vec::new());
        }

        let geometry = preds.select(Axis(0), &kept);
        let boxes = to_pixel_corners(geometry.slice(s![.., 0..CXYWH_OFFSET]), width, height);

        let mut ys: Vec<Detection> = boxes
            .into_iter()
            .zip(scores)
            .zip(class_ids)
            .map(|((bbox, score), class_id)| Detection::new(bbox, score, class_id))
            .collect();

        if let Some(iou) = self.config.iou {
            let before = ys.len();
            non_max_suppression(&mut ys, iou);
            debug!(before, after = ys.len(), "NMS");
        }

        Ok(ys)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::{Array, Array3, ArrayD};

    /// 构造 [1, 4+nc, N] 张量, 每个候选为 (cx, cy, w, h, scores...)
    pub(crate) fn tensor(nc: usize, rows: &[([f32; 4], Vec<(usize, f32)>)]) -> ArrayD<f32> {
        let mut t = Array3::<f32>::zeros((1, 4 + nc, rows.len()));
        for (i, (geom, scores)) in rows.iter().enumerate() {
            for k in 0..4 {
                t[[0, k, i]] = geom[k];
            }
            for &(cls, score) in scores.iter() {
                t[[0, 4 + cls, i]] = score;
            }
        }
        t.into_dyn()
    }

    fn sample() -> ArrayD<f32> {
        tensor(
            80,
            &[
                ([0.5, 0.5, 0.2, 0.4], vec![(0, 0.9)]),
                ([0.2, 0.2, 0.1, 0.1], vec![(2, 0.55), (3, 0.1)]),
                ([0.8, 0.1, 0.1, 0.1], vec![(16, 0.31)]),
                ([0.3, 0.7, 0.3, 0.3], vec![(39, 0.12)]),
            ],
        )
    }

    #[test]
    fn test_single_person() {
        let t = tensor(80, &[([0.5, 0.5, 0.2, 0.4], vec![(0, 0.9)])]);
        let pp = YOLOv10Postprocessor::default();
        let ys = pp.decode(t.view(), 0.3, 640, 480).unwrap();
        assert_eq!(ys.len(), 1);
        assert_eq!(ys[0].class_id, 0);
        assert!((ys[0].score - 0.9).abs() < 1e-6);
        assert!((ys[0].bbox.x1() - 256.).abs() < 1e-3);
        assert!((ys[0].bbox.y2() - 336.).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_is_strict() {
        let t = tensor(3, &[([0.5, 0.5, 0.1, 0.1], vec![(1, 0.5)])]);
        let pp = YOLOv10Postprocessor::default();
        assert!(pp.decode(t.view(), 0.5, 100, 100).unwrap().is_empty());
        assert_eq!(pp.decode(t.view(), 0.49, 100, 100).unwrap().len(), 1);
    }

    #[test]
    fn test_argmax_picks_best_class() {
        let t = tensor(4, &[([0.5, 0.5, 0.1, 0.1], vec![(1, 0.4), (3, 0.7), (2, 0.6)])]);
        let ys = YOLOv10Postprocessor::default()
            .decode(t.view(), 0.3, 100, 100)
            .unwrap();
        assert_eq!(ys[0].class_id, 3);
    }

    #[test]
    fn test_monotonic_filtering() {
        let t = sample();
        let pp = YOLOv10Postprocessor::default();
        let thresholds = [0.0, 0.1, 0.3, 0.5, 0.89, 0.95];
        for pair in thresholds.windows(2) {
            let loose = pp.decode(t.view(), pair[0], 640, 480).unwrap();
            let strict = pp.decode(t.view(), pair[1], 640, 480).unwrap();
            assert!(strict.len() <= loose.len());
            for d in &strict {
                assert!(loose.contains(d));
            }
        }
    }

    #[test]
    fn test_decode_is_pure() {
        let t = sample();
        let pp = YOLOv10Postprocessor::default();
        let a = pp.decode(t.view(), 0.3, 1280, 720).unwrap();
        let b = pp.decode(t.view(), 0.3, 1280, 720).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_nothing_survives() {
        let pp = YOLOv10Postprocessor::default();
        assert!(pp.decode(sample().view(), 0.99, 640, 480).unwrap().is_empty());
        let empty = Array::<f32, _>::zeros((1, 84, 0)).into_dyn();
        assert!(pp.decode(empty.view(), 0.3, 640, 480).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_shape() {
        let pp = YOLOv10Postprocessor::default();
        let flat = Array::<f32, _>::zeros((84, 10)).into_dyn();
        assert!(matches!(
            pp.decode(flat.view(), 0.3, 640, 480),
            Err(WatchError::Shape { .. })
        ));
        let batch2 = Array::<f32, _>::zeros((2, 84, 10)).into_dyn();
        assert!(matches!(
            pp.decode(batch2.view(), 0.3, 640, 480),
            Err(WatchError::Shape { .. })
        ));
        let no_classes = Array::<f32, _>::zeros((1, 4, 10)).into_dyn();
        assert!(matches!(
            pp.decode(no_classes.view(), 0.3, 640, 480),
            Err(WatchError::Shape { .. })
        ));
    }

    #[test]
    fn test_optional_nms() {
        let t = tensor(
            3,
            &[
                ([0.5, 0.5, 0.2, 0.2], vec![(1, 0.9)]),
                ([0.51, 0.5, 0.2, 0.2], vec![(1, 0.8)]),
            ],
        );
        let plain = YOLOv10Postprocessor::default();
        assert_eq!(plain.decode(t.view(), 0.3, 100, 100).unwrap().len(), 2);
        let nms = YOLOv10Postprocessor::new(YOLOv10Config { iou: Some(0.5) });
        let ys = nms.decode(t.view(), 0.3, 100, 100).unwrap();
        assert_eq!(ys.len(), 1);
        assert!((ys[0].score - 0.9).abs() < 1e-6);
    }
}
