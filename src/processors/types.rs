//! Types used in image processing operations
//!
//! Enums selecting between processing policies, plus the per-image resize
//! record that links a preprocessed tensor back to its source image.

use serde::{Deserialize, Serialize};

/// Specifies how to limit the size of an image during detection resizing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    /// Scale up until the smaller dimension reaches the limit
    Min,
    /// Scale down until the larger dimension fits the limit
    #[default]
    Max,
}

/// Specifies how the DB decoder scores a candidate region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Mean probability inside the candidate's minimum-area rectangle
    Fast,
    /// Mean probability inside the traced contour polygon
    #[default]
    Slow,
}

/// Channel order written into the normalized tensor.
///
/// Images are held as RGB. Paddle models are trained on BGR input, so the
/// default swaps channels while normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorOrder {
    RGB,
    #[default]
    BGR,
}

impl ColorOrder {
    /// Index of the source RGB channel written to output channel `c`.
    #[inline]
    pub fn source_channel(self, c: usize) -> usize {
        match self {
            ColorOrder::RGB => c,
            ColorOrder::BGR => 2 - c,
        }
    }
}

/// How one image was resized during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeMeta {
    /// Source height in pixels
    pub src_h: u32,
    /// Source width in pixels
    pub src_w: u32,
    /// `resized_h / src_h`
    pub ratio_h: f32,
    /// `resized_w / src_w`
    pub ratio_w: f32,
}

impl ResizeMeta {
    pub fn new(src_w: u32, src_h: u32, resized_w: u32, resized_h: u32) -> Self {
        Self {
            src_h,
            src_w,
            ratio_h: resized_h as f32 / src_h.max(1) as f32,
            ratio_w: resized_w as f32 / src_w.max(1) as f32,
        }
    }
}
