// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 坐标变换: 归一化中心点框 → 原图像素角点框, 以及可选的 NMS

use ndarray::ArrayView2;

use crate::models::{Bbox, Detection};

/// 中心点形式 (cx, cy, w, h) → 角点形式 (x1, y1, x2, y2)
///
/// 输入的每行已经归一化到 [0, 1] (相对模型输入尺寸), 所以直接乘以 *原图* 宽高,
/// 不再做 "撤销模型缩放" 这一步. 若换成输出为输入像素单位的检测头, 这里会重复缩放.
pub fn to_pixel_corners(cxcywh: ArrayView2<f32>, width: u32, height: u32) -> Vec<Bbox> {
    let (w0, h0) = (width as f32, height as f32);
    cxcywh
        .rows()
        .into_iter()
        .map(|row| {
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            Bbox::new(
                (cx - w / 2.) * w0,
                (cy - h / 2.) * h0,
                (cx + w / 2.) * w0,
                (cy + h / 2.) * h0,
            )
        })
        .collect()
}

/// 按类别的贪心 NMS (不同类别的框互不抑制)
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id != xs[index].class_id {
                continue;
            }
            let iou = xs[prev_index].bbox.iou(&xs[index].bbox);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
