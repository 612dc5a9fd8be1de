// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 视频帧: 3通道像素网格 + 显式通道顺序
// 推理引擎要求 RGB, 显示端同样是 RGB, 但中间环节可能是 BGR, 所以每一帧都带着自己的顺序

use image::{imageops, RgbImage};

use crate::error::{Result, WatchError};

/// 像素通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// 一帧图像 (行优先, 每像素3字节)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(WatchError::shape(
                format!("{} bytes for {}x{}x3", expected, width, height),
                &[data.len()],
            ));
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// 全黑帧 (输入缺失时的替代帧)
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            order: ChannelOrder::Rgb,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            order: ChannelOrder::Rgb,
            data: img.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// 转换为指定通道顺序 (相同则原样返回)
    pub fn into_order(mut self, order: ChannelOrder) -> Self {
        if self.order != order {
            for px in self.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    /// 转成 RGB 的 `RgbImage` (复制一份)
    pub fn to_rgb_image(&self) -> RgbImage {
        let rgb = self.clone().into_order(ChannelOrder::Rgb);
        // 尺寸在构造时已校验
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// 从 RGB 图像回到指定通道顺序
    pub fn from_rgb_image_in(img: RgbImage, order: ChannelOrder) -> Self {
        Self::from_rgb_image(img).into_order(order)
    }

    /// 缩放到固定尺寸 (保持通道顺序)
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if self.width == width && self.height == height {
            return self.clone();
        }
        let img = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height));
        let resized = imageops::resize(&img, width, height, imageops::FilterType::Triangle);
        Self {
            width,
            height,
            order: self.order,
            data: resized.into_raw(),
        }
    }
}
