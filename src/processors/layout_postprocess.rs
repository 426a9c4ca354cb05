//! Layout detection post-processing for PicoDet-style models.
//!
//! PicoDet predicts, for every cell of every FPN level, one score per class
//! and four side distances encoded as distributions over `reg_max` bins
//! (generalized focal loss). Decoding keeps confident cells, converts their
//! distributions to boxes around the cell centre, runs per-class NMS and maps
//! the boxes back to source pixels.

use crate::core::{OCRError, OcrResult};
use crate::processors::argmax::argmax;
use crate::processors::types::ResizeMeta;
use ndarray::{ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// A detected layout region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub class_id: usize,
    pub label: String,
    pub score: f32,
    /// `[x1, y1, x2, y2]` in source pixels
    pub bbox: [f32; 4],
}

/// Softmax over `logits` followed by the expectation of the bin index.
pub fn distribution_expectation(logits: &[f32]) -> f32 {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let weights: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let total: f32 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| i as f32 * w)
        .sum::<f32>()
        / total
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes; 0.0 when they do
/// not overlap.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = a[2].min(b[2]) - a[0].max(b[0]);
    let h = a[3].min(b[3]) - a[1].max(b[1]);
    if w <= 0.0 || h <= 0.0 {
        return 0.0;
    }
    let inter = w * h;
    let area = |r: &[f32; 4]| (r[2] - r[0]) * (r[3] - r[1]);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Greedy NMS within each class. Output is grouped by class id, highest score
/// first within a class.
fn nms_per_class(mut boxes: Vec<LayoutBox>, threshold: f32) -> Vec<LayoutBox> {
    boxes.sort_by(|a, b| {
        a.class_id
            .cmp(&b.class_id)
            .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });

    let mut kept: Vec<LayoutBox> = Vec::with_capacity(boxes.len());
    let mut class_start = 0;
    for candidate in boxes {
        if kept
            .last()
            .is_some_and(|last| last.class_id != candidate.class_id)
        {
            class_start = kept.len();
        }
        if kept[class_start..]
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) <= threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

/// PicoDet decoder.
#[derive(Debug, Clone)]
pub struct PicoDetPostProcess {
    pub labels: Vec<String>,
    pub fpn_strides: Vec<usize>,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl PicoDetPostProcess {
    /// Decodes a batch.
    ///
    /// `outputs` holds the `N` score tensors `[B, cells, num_class]` followed
    /// by the `N` box tensors `[B, cells, 4 * reg_max]`, where `N` is the
    /// number of strides. `input_size` is the network input `(height, width)`.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the output count, batch size, cell count,
    /// class count or box width is inconsistent.
    pub fn apply(
        &self,
        outputs: &[ArrayView3<f32>],
        input_size: (usize, usize),
        metas: &[ResizeMeta],
    ) -> OcrResult<Vec<Vec<LayoutBox>>> {
        let levels = self.fpn_strides.len();
        if outputs.len() != 2 * levels {
            return Err(OCRError::shape_mismatch(
                "layout outputs",
                format!("{} tensors", 2 * levels),
                &[outputs.len() as i64],
            ));
        }
        let reg_max = outputs[levels].shape()[2] / 4;
        if reg_max < 2 {
            return Err(OCRError::shape_mismatch(
                "layout box distribution",
                "last dimension 4 * reg_max with reg_max >= 2",
                &dims(&outputs[levels]),
            ));
        }

        let (in_h, in_w) = input_size;
        for (level, &stride) in self.fpn_strides.iter().enumerate() {
            let cells = in_h.div_ceil(stride) * in_w.div_ceil(stride);
            let (scores, boxes) = (&outputs[level], &outputs[levels + level]);
            if scores.shape() != [metas.len(), cells, self.labels.len()] {
                return Err(OCRError::shape_mismatch(
                    format!("layout scores (stride {stride})"),
                    format!("[{}, {cells}, {}]", metas.len(), self.labels.len()),
                    &dims(scores),
                ));
            }
            if boxes.shape() != [metas.len(), cells, 4 * reg_max] {
                return Err(OCRError::shape_mismatch(
                    format!("layout boxes (stride {stride})"),
                    format!("[{}, {cells}, {}]", metas.len(), 4 * reg_max),
                    &dims(boxes),
                ));
            }
        }

        Ok(metas
            .iter()
            .enumerate()
            .map(|(b, meta)| {
                let levels_for_sample: Vec<(ArrayView2<f32>, ArrayView2<f32>)> = (0..levels)
                    .map(|l| {
                        (
                            outputs[l].index_axis(Axis(0), b),
                            outputs[levels + l].index_axis(Axis(0), b),
                        )
                    })
                    .collect();
                self.decode_sample(&levels_for_sample, reg_max, input_size, meta)
            })
            .collect())
    }

    fn decode_sample(
        &self,
        levels: &[(ArrayView2<f32>, ArrayView2<f32>)],
        reg_max: usize,
        (in_h, in_w): (usize, usize),
        meta: &ResizeMeta,
    ) -> Vec<LayoutBox> {
        let mut candidates = Vec::new();
        for ((scores, dists), &stride) in levels.iter().zip(&self.fpn_strides) {
            let feature_w = in_w.div_ceil(stride);
            for (cell, row) in scores.outer_iter().enumerate() {
                let Some((class_id, score)) = argmax(row.iter()) else {
                    continue;
                };
                if score <= self.score_threshold {
                    continue;
                }

                let stride_f = stride as f32;
                let ct_x = ((cell % feature_w) as f32 + 0.5) * stride_f;
                let ct_y = ((cell / feature_w) as f32 + 0.5) * stride_f;
                let dist = dists.row(cell).to_vec();
                let sides: Vec<f32> = dist
                    .chunks_exact(reg_max)
                    .map(|bins| distribution_expectation(bins) * stride_f)
                    .collect();

                candidates.push(LayoutBox {
                    class_id,
                    label: self.labels.get(class_id).cloned().unwrap_or_default(),
                    score,
                    bbox: [
                        (ct_x - sides[0]).max(0.0),
                        (ct_y - sides[1]).max(0.0),
                        (ct_x + sides[2]).min(in_w as f32),
                        (ct_y + sides[3]).min(in_h as f32),
                    ],
                });
            }
        }

        let candidate_count = candidates.len();
        let mut kept = nms_per_class(candidates, self.nms_threshold);
        debug!("layout: {candidate_count} candidates, {} after NMS", kept.len());

        for b in &mut kept {
            b.bbox[0] /= meta.ratio_w;
            b.bbox[2] /= meta.ratio_w;
            b.bbox[1] /= meta.ratio_h;
            b.bbox[3] /= meta.ratio_h;
        }
        kept
    }
}

fn dims(t: &ArrayView3<f32>) -> Vec<i64> {
    t.shape().iter().map(|&d| d as i64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn layout_box(class_id: usize, score: f32, bbox: [f32; 4]) -> LayoutBox {
        LayoutBox {
            class_id,
            label: class_id.to_string(),
            score,
            bbox,
        }
    }

    #[test]
    fn test_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        assert!((iou(&a, &b) - 25.0 / 175.0).abs() < 1e-6);
        assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distribution_expectation() {
        assert!((distribution_expectation(&[0.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((distribution_expectation(&[50.0, 0.0, 0.0, 0.0])).abs() < 1e-4);
    }

    #[test]
    fn test_nms_is_per_class() {
        let boxes = vec![
            layout_box(0, 0.6, [0.0, 0.0, 10.0, 10.0]),
            layout_box(0, 0.9, [1.0, 1.0, 10.0, 10.0]),
            layout_box(1, 0.7, [0.0, 0.0, 10.0, 10.0]),
            layout_box(0, 0.8, [50.0, 50.0, 60.0, 60.0]),
        ];
        let kept = nms_per_class(boxes, 0.5);
        let scores: Vec<f32> = kept.iter().map(|b| b.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7]);
    }

    fn decoder() -> PicoDetPostProcess {
        PicoDetPostProcess {
            labels: vec!["text".into(), "table".into()],
            fpn_strides: vec![8, 16],
            score_threshold: 0.5,
            nms_threshold: 0.5,
        }
    }

    #[test]
    fn test_decode_single_cell() {
        let dec = decoder();
        let (in_h, in_w) = (32, 32);
        let reg_max = 4;
        let mut s8 = Array3::<f32>::zeros((1, 16, 2));
        let s16 = Array3::<f32>::zeros((1, 4, 2));
        let mut d8 = Array3::<f32>::zeros((1, 16, 4 * reg_max));
        let d16 = Array3::<f32>::zeros((1, 4, 4 * reg_max));

        // Cell (row 1, col 2) on stride 8, centre (20, 12); every side
        // concentrates on bin 1, i.e. 8 px.
        let cell = 4 + 2;
        s8[[0, cell, 1]] = 0.9;
        for side in 0..4 {
            d8[[0, cell, side * reg_max + 1]] = 30.0;
        }

        let meta = ResizeMeta::new(64, 64, 32, 32);
        let outputs = [s8.view(), s16.view(), d8.view(), d16.view()];
        let results = dec.apply(&outputs, (in_h, in_w), &[meta]).unwrap();
        assert_eq!(results[0].len(), 1);
        let found = &results[0][0];
        assert_eq!(found.label, "table");
        let expected = [24.0, 8.0, 56.0, 40.0];
        for (got, want) in found.bbox.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
    }

    #[test]
    fn test_wrong_output_count_rejected() {
        let dec = decoder();
        let s = Array3::<f32>::zeros((1, 16, 2));
        let meta = ResizeMeta::new(32, 32, 32, 32);
        assert!(matches!(
            dec.apply(&[s.view()], (32, 32), &[meta]),
            Err(OCRError::ShapeMismatch { .. })
        ));
    }
}
