// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 工具模块
pub mod geometry;

pub use geometry::{non_max_suppression, to_pixel_corners};
