//! Post-processing for DB (Differentiable Binarization) text detection models.
//!
//! [`DBPostProcess`] turns a `[B, 1, H, W]` probability map into text
//! quadrilaterals in source-image pixels: binarize, optionally dilate, trace
//! contours, score each candidate, unclip it, then map it back through the
//! per-image [`ResizeMeta`]. Bitmap extraction, scoring and mask morphology
//! live in sibling files.

#[path = "db_bitmap.rs"]
mod db_bitmap;
#[path = "db_mask.rs"]
mod db_mask;
#[path = "db_score.rs"]
mod db_score;

use crate::core::constants::{
    DEFAULT_DET_BOX_THRESH, DEFAULT_DET_THRESH, DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_POLYGON_SIDE,
    DEFAULT_MIN_SIZE, DEFAULT_UNCLIP_RATIO,
};
use crate::core::{OCRError, OcrResult};
use crate::processors::geometry::{Point, order_points_clockwise};
use crate::processors::types::{ResizeMeta, ScoreMode};
use ndarray::{ArrayView2, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

/// A detected text region: four integer corners in source-image pixels,
/// clockwise from top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPolygon {
    pub points: [(i32, i32); 4],
    /// Mean probability over the region before unclipping
    pub score: f32,
}

impl TextPolygon {
    /// Length of the top edge.
    pub fn width(&self) -> f32 {
        edge_len(self.points[0], self.points[1])
    }

    /// Length of the left edge.
    pub fn height(&self) -> f32 {
        edge_len(self.points[0], self.points[3])
    }

    /// Axis-aligned extent `[x_min, y_min, x_max, y_max]`.
    pub fn bounds(&self) -> [i32; 4] {
        let xs = self.points.map(|p| p.0);
        let ys = self.points.map(|p| p.1);
        [
            xs.iter().copied().min().unwrap_or(0),
            ys.iter().copied().min().unwrap_or(0),
            xs.iter().copied().max().unwrap_or(0),
            ys.iter().copied().max().unwrap_or(0),
        ]
    }
}

fn edge_len(a: (i32, i32), b: (i32, i32)) -> f32 {
    (((a.0 - b.0).pow(2) + (a.1 - b.1).pow(2)) as f32).sqrt()
}

/// Post-processor for DB text detection models.
#[derive(Debug, Clone)]
pub struct DBPostProcess {
    /// Binarization threshold on the probability map
    pub thresh: f32,
    /// Minimum candidate score
    pub box_thresh: f32,
    /// Maximum number of contours examined per image
    pub max_candidates: usize,
    /// Outward offset factor applied to each box
    pub unclip_ratio: f32,
    /// Minimum short side of a candidate, in map pixels
    pub min_size: f32,
    pub score_mode: ScoreMode,
    /// Dilate the bitmap with a 2×2 element before tracing
    pub use_dilation: bool,
}

impl Default for DBPostProcess {
    fn default() -> Self {
        Self {
            thresh: DEFAULT_DET_THRESH,
            box_thresh: DEFAULT_DET_BOX_THRESH,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            unclip_ratio: DEFAULT_UNCLIP_RATIO,
            min_size: DEFAULT_MIN_SIZE,
            score_mode: ScoreMode::default(),
            use_dilation: false,
        }
    }
}

impl DBPostProcess {
    /// Decodes a batch of `[B, 1, H, W]` probability maps, one
    /// [`ResizeMeta`] per map.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the map has more than one channel or the
    /// batch size differs from `metas.len()`.
    pub fn apply(
        &self,
        preds: &ArrayView4<f32>,
        metas: &[ResizeMeta],
    ) -> OcrResult<Vec<Vec<TextPolygon>>> {
        let shape = preds.shape();
        if shape[0] != metas.len() || shape[1] != 1 {
            return Err(OCRError::shape_mismatch(
                "detection probability map",
                format!("[{}, 1, H, W]", metas.len()),
                &shape.iter().map(|&d| d as i64).collect::<Vec<_>>(),
            ));
        }

        Ok(preds
            .axis_iter(Axis(0))
            .zip(metas)
            .map(|(map, meta)| self.process(&map.index_axis(Axis(0), 0), meta))
            .collect())
    }

    /// Decodes a single `[H, W]` probability map.
    pub fn process(&self, pred: &ArrayView2<f32>, meta: &ResizeMeta) -> Vec<TextPolygon> {
        let bitmap = self.binarize(pred);
        let bitmap = if self.use_dilation {
            self.dilate_mask(&bitmap)
        } else {
            bitmap
        };

        self.boxes_from_bitmap(pred, &bitmap)
            .into_iter()
            .filter_map(|(corners, score)| to_source(corners, score, meta))
            .collect()
    }
}

/// Maps a map-space quadrilateral back to source pixels.
///
/// Returns `None` for polygons whose top or left edge is at most
/// [`DEFAULT_MIN_POLYGON_SIDE`] pixels after rescaling.
fn to_source(corners: [Point; 4], score: f32, meta: &ResizeMeta) -> Option<TextPolygon> {
    let max_x = meta.src_w.saturating_sub(1) as i32;
    let max_y = meta.src_h.saturating_sub(1) as i32;
    let points = order_points_clockwise(corners).map(|p| {
        let x = (p.x / meta.ratio_w) as i32;
        let y = (p.y / meta.ratio_h) as i32;
        (x.clamp(0, max_x), y.clamp(0, max_y))
    });

    let polygon = TextPolygon { points, score };
    if (polygon.width() as i32) <= DEFAULT_MIN_POLYGON_SIDE
        || (polygon.height() as i32) <= DEFAULT_MIN_POLYGON_SIDE
    {
        return None;
    }
    Some(polygon)
}
