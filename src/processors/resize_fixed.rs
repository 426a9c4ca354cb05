//! Fixed-target resizing for table structure and layout models.

use crate::core::validation::validate_positive;
use crate::core::OcrResult;
use crate::processors::types::ResizeMeta;
use image::RgbImage;
use image::imageops::{self, FilterType};

/// Scales the longer side to `max_len`; the caller pads to a
/// `max_len`×`max_len` square.
#[derive(Debug, Clone, Copy)]
pub struct TableResize {
    pub max_len: u32,
}

impl TableResize {
    pub fn new(max_len: u32) -> OcrResult<Self> {
        validate_positive(max_len, "table_max_len")?;
        Ok(Self { max_len })
    }

    /// Target `(width, height)` for a `w`×`h` source.
    pub fn target_size(&self, w: u32, h: u32) -> (u32, u32) {
        let ratio = self.max_len as f32 / w.max(h).max(1) as f32;
        let resize_w = ((w as f32 * ratio) as u32).clamp(1, self.max_len);
        let resize_h = ((h as f32 * ratio) as u32).clamp(1, self.max_len);
        (resize_w, resize_h)
    }

    pub fn apply(&self, img: &RgbImage) -> (RgbImage, ResizeMeta) {
        let (w, h) = img.dimensions();
        let (resize_w, resize_h) = self.target_size(w, h);
        (
            imageops::resize(img, resize_w, resize_h, FilterType::Triangle),
            ResizeMeta::new(w, h, resize_w, resize_h),
        )
    }
}

/// Anisotropic resize to an exact `height`×`width`.
#[derive(Debug, Clone, Copy)]
pub struct ExactResize {
    pub height: u32,
    pub width: u32,
}

impl ExactResize {
    pub fn new(height: u32, width: u32) -> OcrResult<Self> {
        validate_positive(height, "input height")?;
        validate_positive(width, "input width")?;
        Ok(Self { height, width })
    }

    pub fn apply(&self, img: &RgbImage) -> (RgbImage, ResizeMeta) {
        let (w, h) = img.dimensions();
        (
            imageops::resize(img, self.width, self.height, FilterType::Triangle),
            ResizeMeta::new(w, h, self.width, self.height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_resize_long_side() {
        let resize = TableResize::new(488).unwrap();
        assert_eq!(resize.target_size(976, 488), (488, 244));
        assert_eq!(resize.target_size(100, 200), (244, 488));
    }

    #[test]
    fn test_table_resize_meta() {
        let resize = TableResize::new(488).unwrap();
        let (out, meta) = resize.apply(&RgbImage::new(244, 122));
        assert_eq!(out.dimensions(), (488, 244));
        assert!((meta.ratio_w - 2.0).abs() < 1e-6);
        assert_eq!(meta.src_w, 244);
    }

    #[test]
    fn test_exact_resize() {
        let resize = ExactResize::new(800, 608).unwrap();
        let (out, meta) = resize.apply(&RgbImage::new(304, 400));
        assert_eq!(out.dimensions(), (608, 800));
        assert!((meta.ratio_w - 2.0).abs() < 1e-6);
        assert!((meta.ratio_h - 2.0).abs() < 1e-6);
    }
}
