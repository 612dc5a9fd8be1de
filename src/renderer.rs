// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 标注渲染: 检测框 + 标签 + 计数叠加
// 纯函数: 输入帧不被修改, 总是返回一份新帧

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::catalog::ClassCatalog;
use crate::frame::Frame;
use crate::models::Detection;
use crate::pipeline::DetectionCounters;

/// 标签字号 = min(宽, 高) × 该系数 (单位: 字号单位)
pub const LABEL_FONT_SCALE: f32 = 0.0006;
/// 标签笔画粗细 = min(宽, 高) × 该系数, 至少 1
pub const LABEL_THICKNESS_SCALE: f32 = 0.001;
/// 一个字号单位对应的像素高度
pub const FONT_UNIT_PX: f32 = 30.0;
/// 检测框线宽 (像素)
pub const BOX_THICKNESS: u32 = 2;
/// 标签基线在框上沿之上的距离
pub const LABEL_OFFSET: i32 = 5;

/// 计数叠加: 左上角纵向排列
pub const COUNTER_ORIGIN: (i32, i32) = (10, 30);
pub const COUNTER_LINE_HEIGHT: i32 = 30;
pub const COUNTER_FONT_SCALE: f32 = 0.8;
pub const COUNTER_THICKNESS: u32 = 2;
pub const COUNTER_COLOR: [u8; 3] = [0, 255, 0];

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 加载字体: 优先使用指定路径, 否则在常见系统字体位置中查找
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = path {
        candidates.push(p.to_path_buf());
    }
    if let Some(dir) = dirs::font_dir() {
        candidates.push(dir.join("DejaVuSans.ttf"));
    }
    candidates.extend(SYSTEM_FONTS.iter().map(PathBuf::from));

    for candidate in candidates {
        let Ok(bytes) = std::fs::read(&candidate) else {
            continue;
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                debug!(font = %candidate.display(), "font loaded");
                return Some(font);
            }
            Err(e) => warn!(font = %candidate.display(), error = %e, "invalid font"),
        }
    }
    warn!("no usable font found, labels will not be drawn");
    None
}

/// 检测标签文本 `"{类别}: {分数:.2}"`
pub fn label(name: &str, score: f32) -> String {
    format!("{}: {:.2}", name, score)
}

/// 标注器
///
/// 同一实现同时服务于引擎内部路径和流水线的过滤路径
#[derive(Clone, Default)]
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 绘制检测框和 `"{类别}: {分数:.2}"` 标签
    ///
    /// 标签画在框上沿之上; 贴着画面顶部的框, 标签会部分超出画布 (保持原样, 不做下移).
    /// 类别表之外的 class_id 不绘制, 调用方应事先校验.
    pub fn annotate(&self, frame: &Frame, detections: &[Detection], catalog: &ClassCatalog) -> Frame {
        if detections.is_empty() {
            return frame.clone();
        }

        let mut img = frame.to_rgb_image();
        let min_side = frame.width().min(frame.height()) as f32;
        let label_scale = PxScale::from((min_side * LABEL_FONT_SCALE * FONT_UNIT_PX).max(1.0));
        let label_thickness = ((min_side * LABEL_THICKNESS_SCALE) as u32).max(1);

        for det in detections {
            let (name, color) = match (catalog.name(det.class_id), catalog.color(det.class_id)) {
                (Ok(name), Ok(color)) => (name, Rgb(color)),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "skipping detection");
                    continue;
                }
            };
            let x1 = det.bbox.x1() as i32;
            let y1 = det.bbox.y1() as i32;
            let x2 = det.bbox.x2() as i32;
            let y2 = det.bbox.y2() as i32;
            draw_box(&mut img, (x1, y1, x2, y2), color, BOX_THICKNESS);

            if let Some(font) = &self.font {
                let text = label(name, det.score);
                let (_, text_h) = text_size(label_scale, font, &text);
                let top = y1 - LABEL_OFFSET - text_h as i32;
                draw_thick_text(&mut img, color, (x1, top), label_scale, font, &text, label_thickness);
            }
        }

        Frame::from_rgb_image_in(img, frame.order())
    }

    /// 左上角逐行绘制本帧计数 `"{类别}: {数量}"`, 按首次计数顺序
    pub fn draw_counters(&self, frame: &Frame, counters: &DetectionCounters) -> Frame {
        let Some(font) = &self.font else {
            return frame.clone();
        };
        if counters.is_empty() {
            return frame.clone();
        }

        let mut img = frame.to_rgb_image();
        let scale = PxScale::from(COUNTER_FONT_SCALE * FONT_UNIT_PX);
        let (x, mut baseline) = COUNTER_ORIGIN;
        for (name, count) in counters.iter() {
            let text = format!("{}: {}", name, count);
            let (_, text_h) = text_size(scale, font, &text);
            draw_thick_text(
                &mut img,
                Rgb(COUNTER_COLOR),
                (x, baseline - text_h as i32),
                scale,
                font,
                &text,
                COUNTER_THICKNESS,
            );
            baseline += COUNTER_LINE_HEIGHT;
        }

        Frame::from_rgb_image_in(img, frame.order())
    }
}

/// 向外扩展的多层空心矩形
fn draw_box(img: &mut RgbImage, (x1, y1, x2, y2): (i32, i32, i32, i32), color: Rgb<u8>, thickness: u32) {
    let width = (x2 - x1).max(1) as u32;
    let height = (y2 - y1).max(1) as u32;
    for i in 0..thickness {
        let rect = Rect::at(x1 - i as i32, y1 - i as i32).of_size(width + 2 * i, height + 2 * i);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// 通过水平平移重复绘制来加粗文字
fn draw_thick_text(
    img: &mut RgbImage,
    color: Rgb<u8>,
    (x, y): (i32, i32),
    scale: PxScale,
    font: &FontArc,
    text: &str,
    thickness: u32,
) {
    for dx in 0..thickness as i32 {
        draw_text_mut(img, color, x + dx, y, scale, font, text);
    }
}
