//! Image normalization and batch packing.
//!
//! Normalization maps every 8-bit channel value `v` to `v * alpha + beta` with
//! `alpha = scale / std` and `beta = -mean / std`, writing channel-first
//! (CHW) output in the configured [`ColorOrder`]. Packing copies normalized
//! images into the top-left corner of a zeroed `[B, 3, H, W]` tensor, so any
//! padding is exactly zero in normalized space.

use crate::core::constants::{HALF_MEAN, HALF_STD, IMAGENET_MEAN, IMAGENET_STD};
use crate::core::validation::{validate_finite, validate_normalization_params, validate_positive};
use crate::core::{OCRError, OcrResult, Tensor3D, Tensor4D};
use crate::processors::types::ColorOrder;
use image::RgbImage;
use ndarray::s;

/// Per-channel affine normalization.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each output channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each output channel (beta = -mean / std)
    pub beta: [f32; 3],
    /// Output channel order
    pub color_order: ColorOrder,
}

impl NormalizeImage {
    /// Creates a normalizer.
    ///
    /// `mean` and `std` are indexed by output channel, i.e. they are given in
    /// `color_order`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `scale` is not positive and finite, if
    /// `mean`/`std` do not have three entries, or if any std is not positive.
    pub fn new(scale: f32, mean: &[f32], std: &[f32], color_order: ColorOrder) -> OcrResult<Self> {
        validate_finite(scale, "scale")?;
        validate_positive(scale, "scale")?;
        validate_normalization_params(mean, std, 3)?;

        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }
        Ok(Self {
            alpha,
            beta,
            color_order,
        })
    }

    /// ImageNet statistics, used by detection, table and layout models.
    pub fn imagenet(color_order: ColorOrder) -> OcrResult<Self> {
        Self::new(1.0 / 255.0, &IMAGENET_MEAN, &IMAGENET_STD, color_order)
    }

    /// Mean 0.5 / std 0.5, mapping pixels to `[-1, 1]`; used by recognition
    /// and classification models.
    pub fn symmetric(color_order: ColorOrder) -> OcrResult<Self> {
        Self::new(1.0 / 255.0, &HALF_MEAN, &HALF_STD, color_order)
    }

    /// Normalizes one image into a `[3, H, W]` array.
    pub fn normalize(&self, img: &RgbImage) -> Tensor3D {
        let (width, height) = img.dimensions();
        let mut out = Tensor3D::zeros((3, height as usize, width as usize));
        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..3 {
                let v = pixel[self.color_order.source_channel(c)] as f32;
                out[[c, y as usize, x as usize]] = v * self.alpha[c] + self.beta[c];
            }
        }
        out
    }

}

/// Copies `[3, h, w]` arrays into the top-left corner of a zeroed
/// `[B, 3, height, width]` tensor.
///
/// # Errors
///
/// Returns `InvalidInput` when an image is larger than the target or does not
/// have three channels.
pub fn pack_batch(images: &[Tensor3D], height: usize, width: usize) -> OcrResult<Tensor4D> {
    let mut batch = Tensor4D::zeros((images.len(), 3, height, width));
    for (i, img) in images.iter().enumerate() {
        let (c, h, w) = img.dim();
        if c != 3 || h > height || w > width {
            return Err(OCRError::invalid_input(format!(
                "image {i} with shape [{c}, {h}, {w}] does not fit batch target [3, {height}, {width}]"
            )));
        }
        batch.slice_mut(s![i, .., ..h, ..w]).assign(img);
    }
    Ok(batch)
}
