//! Bounded-side resizing for text detection.
//!
//! The detection network accepts any input whose sides are multiples of 32.
//! Images are scaled so that their longer (`Max`) or shorter (`Min`) side
//! meets `limit_side_len`, then each side is rounded to the nearest multiple
//! of 32 (never below 32). The per-axis ratios are kept in [`ResizeMeta`] so
//! the decoder can map polygons back to source pixels.

use crate::core::constants::{DEFAULT_LIMIT_SIDE_LEN, DEFAULT_MAX_SIDE_LIMIT, DET_SIZE_DIVISOR};
use crate::core::validation::validate_positive;
use crate::core::OcrResult;
use crate::processors::types::{LimitType, ResizeMeta};
use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::warn;

/// Resizer for detection inputs.
#[derive(Debug, Clone)]
pub struct DetResize {
    /// The length the limited side is scaled towards
    pub limit_side_len: u32,
    /// Which side the limit applies to
    pub limit_type: LimitType,
    /// Hard cap on either side after scaling
    pub max_side_limit: u32,
}

impl Default for DetResize {
    fn default() -> Self {
        Self {
            limit_side_len: DEFAULT_LIMIT_SIDE_LEN,
            limit_type: LimitType::Max,
            max_side_limit: DEFAULT_MAX_SIDE_LIMIT,
        }
    }
}

impl DetResize {
    pub fn new(limit_side_len: u32, limit_type: LimitType, max_side_limit: u32) -> OcrResult<Self> {
        validate_positive(limit_side_len, "limit_side_len")?;
        validate_positive(max_side_limit, "max_side_limit")?;
        Ok(Self {
            limit_side_len,
            limit_type,
            max_side_limit,
        })
    }

    /// Computes the target `(width, height)` for a `w`×`h` source.
    pub fn target_size(&self, w: u32, h: u32) -> (u32, u32) {
        let limit = self.limit_side_len as f32;
        let ratio = match self.limit_type {
            LimitType::Max if h.max(w) > self.limit_side_len => limit / h.max(w) as f32,
            LimitType::Min if h.min(w) < self.limit_side_len => limit / h.min(w) as f32,
            _ => 1.0,
        };

        let mut resize_h = (h as f32 * ratio) as u32;
        let mut resize_w = (w as f32 * ratio) as u32;

        if resize_h.max(resize_w) > self.max_side_limit {
            warn!(
                "Resized image size ({}x{}) exceeds max_side_limit of {}. Resizing to fit within limit.",
                resize_h, resize_w, self.max_side_limit
            );
            let limit_ratio = self.max_side_limit as f32 / resize_h.max(resize_w) as f32;
            resize_h = (resize_h as f32 * limit_ratio) as u32;
            resize_w = (resize_w as f32 * limit_ratio) as u32;
        }

        (round_to_divisor(resize_w), round_to_divisor(resize_h))
    }

    /// Resizes one image and records the scale ratios.
    pub fn apply(&self, img: &RgbImage) -> (RgbImage, ResizeMeta) {
        let (w, h) = img.dimensions();
        let (resize_w, resize_h) = self.target_size(w, h);
        let meta = ResizeMeta::new(w, h, resize_w, resize_h);
        if resize_w == w && resize_h == h {
            return (img.clone(), meta);
        }
        (
            imageops::resize(img, resize_w, resize_h, FilterType::Triangle),
            meta,
        )
    }
}

/// Rounds to the nearest multiple of 32, with a floor of 32.
#[inline]
fn round_to_divisor(v: u32) -> u32 {
    ((v + DET_SIZE_DIVISOR / 2) / DET_SIZE_DIVISOR * DET_SIZE_DIVISOR).max(DET_SIZE_DIVISOR)
}
