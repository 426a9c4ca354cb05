//! Greedy CTC decoding for text-line recognition.
//!
//! The recognizer emits a `[B, T, C]` probability sequence. Decoding takes the
//! argmax at each step, drops the blank (index 0) and collapses consecutive
//! repeats, then averages the probabilities of the accepted steps.

use crate::core::{OCRError, OcrResult};
use crate::processors::argmax::argmax;
use ndarray::{ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label for the CTC blank at index 0.
pub const CTC_BLANK: &str = "#";

/// Recognized text of one text-line image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecResult {
    pub text: String,
    /// Mean probability of the accepted steps
    pub confidence: f32,
}

impl RecResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// The result used when no step was accepted.
    pub fn empty() -> Self {
        Self::new(String::new(), 0.0)
    }
}

/// A CTC decoder over a fixed label list.
#[derive(Clone)]
pub struct CTCLabelDecode {
    labels: Vec<String>,
}

impl std::fmt::Debug for CTCLabelDecode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CTCLabelDecode")
            .field("label_count", &self.labels.len())
            .finish()
    }
}

impl CTCLabelDecode {
    /// Builds the label list `["#", dictionary..., " "]`.
    pub fn new(dictionary: impl IntoIterator<Item = String>) -> Self {
        let labels = std::iter::once(CTC_BLANK.to_string())
            .chain(dictionary)
            .chain(std::iter::once(" ".to_string()))
            .collect();
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of classes the recognizer is expected to emit.
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Decodes a single `[T, C]` sequence.
    ///
    /// A step is accepted when its argmax is not the blank and differs from
    /// the previous step's argmax.
    ///
    /// # Errors
    ///
    /// * `ShapeMismatch` when an argmax falls outside the label list.
    /// * `UncomputableConfidence` (tagged with `index`) when no step is
    ///   accepted or the mean is not finite.
    pub fn decode_sample(&self, index: usize, probs: &ArrayView2<f32>) -> OcrResult<RecResult> {
        let mut text = String::new();
        let mut score_sum = 0.0f32;
        let mut accepted = 0usize;
        let mut last_index = None;

        for step in probs.outer_iter() {
            let Some((idx, prob)) = argmax(step.iter()) else {
                continue;
            };

            if idx > 0 && last_index != Some(idx) {
                let label = self.labels.get(idx).ok_or_else(|| {
                    OCRError::shape_mismatch(
                        "recognition output",
                        format!("class index below {}", self.labels.len()),
                        &[idx as i64],
                    )
                })?;
                text.push_str(label);
                score_sum += prob;
                accepted += 1;
            }
            last_index = Some(idx);
        }

        let confidence = score_sum / accepted as f32;
        if accepted == 0 || !confidence.is_finite() {
            return Err(OCRError::UncomputableConfidence { index });
        }
        Ok(RecResult::new(text, confidence))
    }

    /// Decodes a `[B, T, C]` batch. Samples with no accepted step decode to
    /// an empty string with confidence 0.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when an argmax falls outside the label list.
    pub fn apply(&self, preds: &ArrayView3<f32>) -> OcrResult<Vec<RecResult>> {
        preds
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(index, probs)| match self.decode_sample(index, &probs) {
                Err(OCRError::UncomputableConfidence { index }) => {
                    debug!("no symbol accepted for sample {index}, returning empty text");
                    Ok(RecResult::empty())
                }
                other => other,
            })
            .collect()
    }
}
