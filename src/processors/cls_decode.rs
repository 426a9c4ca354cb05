//! Orientation classifier decoding.

use crate::core::{OCRError, OcrResult};
use crate::processors::argmax::argmax;
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Label whose confident prediction means the crop is upside down.
pub const ROTATED_LABEL: &str = "180";

/// Orientation of one text-line crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClsResult {
    pub class_id: usize,
    pub label: String,
    pub score: f32,
    /// Minimum score at which a "180" prediction triggers rotation
    pub threshold: f32,
}

impl ClsResult {
    /// Whether the crop should be rotated by 180° before recognition.
    pub fn should_rotate(&self) -> bool {
        self.label == ROTATED_LABEL && self.score >= self.threshold
    }
}

/// Per-row argmax decoder for `[B, C]` classifier outputs.
#[derive(Debug, Clone)]
pub struct ClsDecode {
    pub labels: Vec<String>,
    pub threshold: f32,
}

impl ClsDecode {
    pub fn new(labels: Vec<String>, threshold: f32) -> Self {
        Self { labels, threshold }
    }

    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the class count differs from the label
    /// count.
    pub fn apply(&self, preds: &ArrayView2<f32>) -> OcrResult<Vec<ClsResult>> {
        let (batch, classes) = preds.dim();
        if classes != self.labels.len() {
            return Err(OCRError::shape_mismatch(
                "classification output",
                format!("[B, {}]", self.labels.len()),
                &[batch as i64, classes as i64],
            ));
        }

        Ok(preds
            .axis_iter(Axis(0))
            .map(|row| {
                let (class_id, score) = argmax(row.iter()).unwrap_or((0, 0.0));
                ClsResult {
                    class_id,
                    label: self.labels.get(class_id).cloned().unwrap_or_default(),
                    score,
                    threshold: self.threshold,
                }
            })
            .collect())
    }
}
