use super::DBPostProcess;
use crate::processors::geometry::{Point, ScanlineBuffer};
use crate::processors::types::ScoreMode;
use itertools::Itertools;
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Above this many pixels in the bounding region, rows are summed in parallel.
const PARALLEL_PIXEL_THRESHOLD: usize = 8_000;

impl DBPostProcess {
    /// Scores a candidate against the probability map.
    ///
    /// `Slow` averages over the traced contour polygon, `Fast` over the
    /// candidate's mini box.
    pub(super) fn candidate_score(
        &self,
        pred: &ArrayView2<f32>,
        contour: &[Point],
        mini_box: &[Point; 4],
    ) -> f32 {
        match self.score_mode {
            ScoreMode::Slow => polygon_mean(pred, contour),
            ScoreMode::Fast => polygon_mean(pred, mini_box),
        }
    }
}

/// Mean of `pred` over the pixels inside `polygon`, or 0.0 when the polygon
/// covers no pixel.
pub(super) fn polygon_mean(pred: &ArrayView2<f32>, polygon: &[Point]) -> f32 {
    let (height, width) = pred.dim();
    if polygon.len() < 3 || height == 0 || width == 0 {
        return 0.0;
    }

    let Some((min_y, max_y)) = polygon.iter().map(|p| p.y).minmax().into_option() else {
        return 0.0;
    };
    let Some((min_x, max_x)) = polygon.iter().map(|p| p.x).minmax().into_option() else {
        return 0.0;
    };
    let start_y = min_y.floor().clamp(0.0, (height - 1) as f32) as usize;
    let end_y = max_y.ceil().clamp(0.0, (height - 1) as f32) as usize + 1;
    let region_w = (max_x.ceil() - min_x.floor()).max(1.0) as usize;

    let (sum, count) = if (end_y - start_y) * region_w < PARALLEL_PIXEL_THRESHOLD {
        let mut buffer = ScanlineBuffer::new(polygon.len());
        (start_y..end_y)
            .map(|y| buffer.process_scanline(y, polygon, pred))
            .fold((0.0, 0), |(s, c), (ls, lc)| (s + ls, c + lc))
    } else {
        (start_y..end_y)
            .into_par_iter()
            .map_init(
                || ScanlineBuffer::new(polygon.len()),
                |buffer, y| buffer.process_scanline(y, polygon, pred),
            )
            .reduce(|| (0.0, 0), |(s, c), (ls, lc)| (s + ls, c + lc))
    };

    if count > 0 { sum / count as f32 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_polygon_mean_constant_region() {
        let mut pred = Array2::<f32>::zeros((20, 20));
        pred.slice_mut(ndarray::s![5..15, 5..15]).fill(0.8);
        let square = [
            Point::new(5.0, 5.0),
            Point::new(14.0, 5.0),
            Point::new(14.0, 14.0),
            Point::new(5.0, 14.0),
        ];
        assert!((polygon_mean(&pred.view(), &square) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_polygon_mean_triangle_ignores_outside() {
        let mut pred = Array2::<f32>::ones((10, 10));
        // Upper-right half is outside the triangle below the diagonal.
        for y in 0..10 {
            for x in (y + 1)..10 {
                pred[[y, x]] = 0.0;
            }
        }
        let triangle = [
            Point::new(0.0, 0.0),
            Point::new(9.0, 9.0),
            Point::new(0.0, 9.0),
        ];
        let mean = polygon_mean(&pred.view(), &triangle);
        assert!(mean > 0.9, "mean {mean}");
    }

    #[test]
    fn test_polygon_mean_large_region_matches_serial() {
        let pred = Array2::<f32>::from_elem((200, 200), 0.5);
        let square = [
            Point::new(0.0, 0.0),
            Point::new(199.0, 0.0),
            Point::new(199.0, 199.0),
            Point::new(0.0, 199.0),
        ];
        assert!((polygon_mean(&pred.view(), &square) - 0.5).abs() < 1e-5);
    }
}
