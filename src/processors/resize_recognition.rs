//! Fixed-height resizing for text-line recognition and orientation
//! classification.
//!
//! Both networks take text-line crops at a fixed height. Recognition widens
//! the whole batch to fit its widest member; classification caps the width.
//! Padding to the batch width is left to [`pack_batch`], which pads with zeros
//! in normalized space.
//!
//! [`pack_batch`]: crate::processors::normalization::pack_batch

use crate::core::validation::validate_positive;
use crate::core::{OCRError, OcrResult};
use image::RgbImage;
use image::imageops::{self, FilterType};

/// Resizes `img` to height `img_h` preserving aspect ratio, with the width
/// capped at `max_w`.
fn resize_to_height(img: &RgbImage, img_h: u32, max_w: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let ratio = w as f32 / h.max(1) as f32;
    let resize_w = ((img_h as f32 * ratio).ceil() as u32).clamp(1, max_w.max(1));
    imageops::resize(img, resize_w, img_h, FilterType::Triangle)
}

/// Variable-width resizer for recognition batches.
#[derive(Debug, Clone, Copy)]
pub struct RecResize {
    /// Target height
    pub img_h: u32,
    /// Minimum batch width
    pub img_w: u32,
}

impl RecResize {
    /// Creates a resizer from a `[C, H, W]` image shape.
    pub fn new(image_shape: [usize; 3]) -> OcrResult<Self> {
        let [c, h, w] = image_shape;
        if c != 3 {
            return Err(OCRError::invalid_input(format!(
                "recognition image shape must have 3 channels, got {c}"
            )));
        }
        validate_positive(h, "rec_image_shape[1]")?;
        validate_positive(w, "rec_image_shape[2]")?;
        Ok(Self {
            img_h: h as u32,
            img_w: w as u32,
        })
    }

    /// Width shared by every member of the batch:
    /// `int(img_h * max(img_w / img_h, max(w / h)))`.
    pub fn batch_width(&self, images: &[&RgbImage]) -> u32 {
        let max_wh_ratio = images
            .iter()
            .map(|img| img.width() as f32 / img.height().max(1) as f32)
            .fold(self.img_w as f32 / self.img_h as f32, f32::max);
        ((self.img_h as f32 * max_wh_ratio) as u32).max(1)
    }

    /// Resizes one image for a batch of width `batch_width`.
    pub fn apply(&self, img: &RgbImage, batch_width: u32) -> RgbImage {
        resize_to_height(img, self.img_h, batch_width)
    }
}

/// Capped-width resizer for orientation classification.
#[derive(Debug, Clone, Copy)]
pub struct ClsResize {
    /// Target height
    pub img_h: u32,
    /// Maximum (and padded) width
    pub img_w: u32,
}

impl ClsResize {
    /// Creates a resizer from a `[C, H, W]` image shape.
    pub fn new(image_shape: [usize; 3]) -> OcrResult<Self> {
        let [c, h, w] = image_shape;
        if c != 3 {
            return Err(OCRError::invalid_input(format!(
                "classification image shape must have 3 channels, got {c}"
            )));
        }
        validate_positive(h, "cls_image_shape[1]")?;
        validate_positive(w, "cls_image_shape[2]")?;
        Ok(Self {
            img_h: h as u32,
            img_w: w as u32,
        })
    }

    pub fn apply(&self, img: &RgbImage) -> RgbImage {
        resize_to_height(img, self.img_h, self.img_w)
    }
}
