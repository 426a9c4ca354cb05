use super::DBPostProcess;
use crate::processors::geometry::{BoundingBox, Point, mini_box, simplify_chain, unclip};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use ndarray::ArrayView2;
use tracing::trace;

impl DBPostProcess {
    /// Thresholds the probability map on the 8-bit quantized value:
    /// a pixel is on iff `trunc(p * 255) > thresh * 255`.
    pub(super) fn binarize(&self, pred: &ArrayView2<f32>) -> GrayImage {
        let (height, width) = pred.dim();
        let cut = self.thresh * 255.0;
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let quantized = (pred[[y as usize, x as usize]] * 255.0).clamp(0.0, 255.0).trunc();
            Luma([if quantized > cut { 255 } else { 0 }])
        })
    }

    /// Extracts unclipped quadrilaterals (in map coordinates, clamped to the
    /// map) and their scores from a binary bitmap.
    pub(super) fn boxes_from_bitmap(
        &self,
        pred: &ArrayView2<f32>,
        bitmap: &GrayImage,
    ) -> Vec<([Point; 4], f32)> {
        let (width, height) = bitmap.dimensions();
        let contours = find_contours::<u32>(bitmap);

        let mut boxes = Vec::new();
        for contour in contours.into_iter().take(self.max_candidates) {
            if contour.points.len() <= 2 {
                continue;
            }

            let traced = BoundingBox::from_contour(&contour);
            let polygon = simplify_chain(&traced.points);

            let (corners, short_side) = match mini_box(&polygon) {
                Ok(found) => found,
                Err(err) => {
                    trace!("dropping contour: {err}");
                    continue;
                }
            };
            if short_side < self.min_size {
                continue;
            }

            let score = self.candidate_score(pred, &polygon, &corners);
            if score < self.box_thresh {
                continue;
            }

            let (expanded, expanded_side) = match unclip(&corners, self.unclip_ratio)
                .and_then(|points| mini_box(&points))
            {
                Ok(found) => found,
                Err(err) => {
                    trace!("dropping candidate after unclip: {err}");
                    continue;
                }
            };
            if expanded_side < self.min_size + 2.0 {
                continue;
            }

            let clamped = expanded.map(|p| {
                Point::new(
                    p.x.round().clamp(0.0, width as f32),
                    p.y.round().clamp(0.0, height as f32),
                )
            });
            boxes.push((clamped, score));
        }
        boxes
    }
}
