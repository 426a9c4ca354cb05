//! Geometric utilities for OCR processing.
//!
//! Point and polygon primitives, the rotating-calipers minimum-area
//! rectangle, polygon offsetting ("unclip") and the scanline rasterizer used
//! to average a probability map over a polygon.
//!
//! Helpers that can collapse a candidate return
//! [`OCRError::DegenerateGeometry`]; decoders catch it and drop the candidate.

use crate::core::{OCRError, OcrResult};
use clipper2::{EndType, JoinType, Path as ClipperPath};
use imageproc::contours::Contour;
use itertools::Itertools;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A closed polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub points: Vec<Point>,
}

impl BoundingBox {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from a traced contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Area by the shoelace formula; 0.0 below three points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let twice: f32 = (0..n)
            .map(|i| {
                let (a, b) = (self.points[i], self.points[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() / 2.0
    }

    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Convex hull by Graham scan.
    fn convex_hull(&self) -> Vec<Point> {
        if self.points.len() < 3 {
            return self.points.clone();
        }

        let mut points = self.points.clone();
        let start_idx = points
            .iter()
            .position_min_by(|a, b| {
                a.y.partial_cmp(&b.y)
                    .unwrap_or(Ordering::Equal)
                    .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
            })
            .unwrap_or(0);
        points.swap(0, start_idx);
        let start = points[0];

        points[1..].sort_by(|a, b| {
            let cross = cross_product(&start, a, b);
            if cross == 0.0 {
                start
                    .distance(a)
                    .partial_cmp(&start.distance(b))
                    .unwrap_or(Ordering::Equal)
            } else if cross > 0.0 {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::with_capacity(points.len());
        for point in points {
            while hull.len() > 1
                && cross_product(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }
        hull
    }

    /// Minimum-area enclosing rectangle, by rotating calipers over the hull.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateGeometry` for fewer than three points.
    pub fn min_area_rect(&self) -> OcrResult<MinAreaRect> {
        if self.points.len() < 3 {
            return Err(OCRError::degenerate_geometry(format!(
                "min-area rect needs 3 points, got {}",
                self.points.len()
            )));
        }

        let hull = self.convex_hull();
        if hull.len() < 3 {
            // Collinear input: the rectangle is the axis-aligned extent.
            let (min_x, max_x) = self
                .points
                .iter()
                .map(|p| p.x)
                .minmax()
                .into_option()
                .unwrap_or((0.0, 0.0));
            let (min_y, max_y) = self
                .points
                .iter()
                .map(|p| p.y)
                .minmax()
                .into_option()
                .unwrap_or((0.0, 0.0));
            return Ok(MinAreaRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            });
        }

        let mut best: Option<(f32, MinAreaRect)> = None;
        let n = hull.len();
        for i in 0..n {
            let origin = hull[i];
            let edge_x = hull[(i + 1) % n].x - origin.x;
            let edge_y = hull[(i + 1) % n].y - origin.y;
            let edge_len = (edge_x * edge_x + edge_y * edge_y).sqrt();
            if edge_len < f32::EPSILON {
                continue;
            }
            let (nx, ny) = (edge_x / edge_len, edge_y / edge_len);
            let (px, py) = (-ny, nx);

            let (mut min_n, mut max_n) = (f32::MAX, f32::MIN);
            let (mut min_p, mut max_p) = (f32::MAX, f32::MIN);
            for point in &hull {
                let dx = point.x - origin.x;
                let dy = point.y - origin.y;
                let proj_n = nx * dx + ny * dy;
                let proj_p = px * dx + py * dy;
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let (width, height) = (max_n - min_n, max_p - min_p);
            let area = width * height;
            if best.as_ref().is_none_or(|(a, _)| area < *a) {
                let center_n = (min_n + max_n) / 2.0;
                let center_p = (min_p + max_p) / 2.0;
                best = Some((
                    area,
                    MinAreaRect {
                        center: Point::new(
                            origin.x + center_n * nx + center_p * px,
                            origin.y + center_n * ny + center_p * py,
                        ),
                        width,
                        height,
                        angle: ny.atan2(nx) * 180.0 / PI,
                    },
                ));
            }
        }

        best.map(|(_, rect)| rect)
            .ok_or_else(|| OCRError::degenerate_geometry("hull has no non-zero edge"))
    }
}

#[inline]
fn cross_product(p1: &Point, p2: &Point, p3: &Point) -> f32 {
    (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
}

/// A rotated rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinAreaRect {
    pub center: Point,
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// The four corners, in rotation order (not yet sorted).
    pub fn corners(&self) -> [Point; 4] {
        let (sin_a, cos_a) = (self.angle * PI / 180.0).sin_cos();
        let (w_2, h_2) = (self.width / 2.0, self.height / 2.0);
        [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)].map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        })
    }

    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// Minimum-area box of `points`, ordered top-left, top-right, bottom-right,
/// bottom-left, together with its short side.
///
/// Ordering: sort by x; of the two leftmost points the upper one is top-left,
/// of the two rightmost the upper one is top-right.
///
/// # Errors
///
/// Returns `DegenerateGeometry` for fewer than three points or a rectangle
/// with a zero or non-finite side.
pub fn mini_box(points: &[Point]) -> OcrResult<([Point; 4], f32)> {
    let rect = BoundingBox::new(points.to_vec()).min_area_rect()?;
    let min_side = rect.min_side();
    if !min_side.is_finite() || min_side <= 0.0 {
        return Err(OCRError::degenerate_geometry(format!(
            "min-area rect has short side {min_side}"
        )));
    }

    let mut corners = rect.corners();
    corners.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    let (tl, bl) = if corners[1].y > corners[0].y {
        (corners[0], corners[1])
    } else {
        (corners[1], corners[0])
    };
    let (tr, br) = if corners[3].y > corners[2].y {
        (corners[2], corners[3])
    } else {
        (corners[3], corners[2])
    };
    Ok(([tl, tr, br, bl], min_side))
}

/// Orders a quadrilateral clockwise from its top-left corner.
///
/// Points are sorted by x; the two leftmost become top-left and bottom-left
/// (by y), the two rightmost top-right and bottom-right.
pub fn order_points_clockwise(points: [Point; 4]) -> [Point; 4] {
    let mut sorted = points;
    sorted.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    let by_y = |a: &Point, b: &Point| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal);
    let mut left = [sorted[0], sorted[1]];
    let mut right = [sorted[2], sorted[3]];
    left.sort_by(by_y);
    right.sort_by(by_y);
    [left[0], right[0], right[1], left[1]]
}

/// Keeps only the turning points of a traced pixel chain.
///
/// Interior points of straight horizontal, vertical or diagonal runs are
/// dropped. Falls back to the input when fewer than three points would
/// remain.
pub fn simplify_chain(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let step = |v: f32| -> i8 {
        if v > 0.0 {
            1
        } else if v < 0.0 {
            -1
        } else {
            0
        }
    };

    let n = points.len();
    let simplified: Vec<Point> = (0..n)
        .filter_map(|i| {
            let (prev, curr, next) = (points[(i + n - 1) % n], points[i], points[(i + 1) % n]);
            let dir_in = (step(curr.x - prev.x), step(curr.y - prev.y));
            let dir_out = (step(next.x - curr.x), step(next.y - curr.y));
            (dir_in != dir_out).then_some(curr)
        })
        .collect();

    if simplified.len() < 3 {
        points.to_vec()
    } else {
        simplified
    }
}

/// Expands a polygon outward by `area * unclip_ratio / perimeter` with round
/// joins.
///
/// # Errors
///
/// Returns `DegenerateGeometry` when the polygon has no area or perimeter, or
/// when the offset does not produce exactly one polygon.
pub fn unclip(points: &[Point], unclip_ratio: f32) -> OcrResult<Vec<Point>> {
    if points.len() < 3 {
        return Err(OCRError::degenerate_geometry("unclip needs 3 points"));
    }

    let path: ClipperPath = points
        .iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect::<Vec<_>>()
        .into();

    let area = path.signed_area().abs();
    let perimeter = BoundingBox::new(points.to_vec()).perimeter() as f64;
    if area <= f64::EPSILON || perimeter <= f64::EPSILON {
        return Err(OCRError::degenerate_geometry(format!(
            "unclip on polygon with area {area} and perimeter {perimeter}"
        )));
    }

    let delta = area * unclip_ratio as f64 / perimeter;
    let mut offset = path
        .inflate(delta, JoinType::Round, EndType::Polygon, 2.0)
        .into_iter();
    let (Some(expanded), None) = (offset.next(), offset.next()) else {
        return Err(OCRError::degenerate_geometry(
            "unclip did not produce exactly one polygon",
        ));
    };

    let mut out: Vec<Point> = expanded
        .iter()
        .map(|pt| Point::new(pt.x() as f32, pt.y() as f32))
        .collect();
    if let (Some(first), Some(last)) = (out.first(), out.last())
        && out.len() > 1
        && first == last
    {
        out.pop();
    }
    if out.len() < 3 {
        return Err(OCRError::degenerate_geometry("unclipped polygon collapsed"));
    }
    Ok(out)
}

/// Reusable intersection buffer for scanline rasterization.
pub(crate) struct ScanlineBuffer {
    intersections: Vec<f32>,
}

impl ScanlineBuffer {
    pub(crate) fn new(max_polygon_points: usize) -> Self {
        Self {
            intersections: Vec::with_capacity(max_polygon_points),
        }
    }

    /// Sums `pred` over the pixels of row `row` lying inside `polygon`
    /// (even-odd rule, pixel centres at integer coordinates, the bottom edge
    /// excluded). Returns `(sum, count)`.
    pub(crate) fn process_scanline(
        &mut self,
        row: usize,
        polygon: &[Point],
        pred: &ArrayView2<f32>,
    ) -> (f32, usize) {
        self.intersections.clear();
        let y = row as f32;

        let n = polygon.len();
        for i in 0..n {
            let (p1, p2) = (polygon[i], polygon[(i + 1) % n]);
            if ((p1.y <= y && y < p2.y) || (p2.y <= y && y < p1.y))
                && (p2.y - p1.y).abs() > f32::EPSILON
            {
                self.intersections
                    .push(p1.x + (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y));
            }
        }
        self.intersections
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let width = pred.ncols();
        let mut sum = 0.0;
        let mut count = 0;
        for pair in self.intersections.chunks_exact(2) {
            let right = pair[1].floor();
            if right < 0.0 || row >= pred.nrows() {
                continue;
            }
            let x1 = pair[0].ceil().max(0.0) as usize;
            let x2 = (right as usize).min(width.saturating_sub(1));
            for x in x1..=x2 {
                sum += pred[[row, x]];
                count += 1;
            }
        }
        (sum, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, side: f32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ]
    }

    #[test]
    fn test_area_and_perimeter() {
        let bbox = BoundingBox::new(square(0.0, 0.0, 4.0));
        assert!((bbox.area() - 16.0).abs() < 1e-6);
        assert!((bbox.perimeter() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_min_area_rect_of_rotated_square() {
        let diamond = vec![
            Point::new(5.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 5.0),
        ];
        let rect = BoundingBox::new(diamond).min_area_rect().unwrap();
        let side = 50.0f32.sqrt();
        assert!((rect.width - side).abs() < 1e-3);
        assert!((rect.height - side).abs() < 1e-3);
        assert!((rect.center.x - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_area_rect_too_few_points() {
        let err = BoundingBox::new(vec![Point::new(0.0, 0.0)])
            .min_area_rect()
            .unwrap_err();
        assert!(matches!(err, OCRError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_mini_box_order_and_side() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        let (corners, sside) = mini_box(&points).unwrap();
        assert!((sside - 5.0).abs() < 1e-3);
        assert!(corners[0].x < corners[1].x && corners[0].y < corners[3].y);
        assert!(corners[2].x > corners[3].x && corners[2].y > corners[1].y);
    }

    #[test]
    fn test_mini_box_collinear_is_degenerate() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ];
        assert!(matches!(
            mini_box(&line),
            Err(OCRError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_order_points_clockwise() {
        let shuffled = [
            Point::new(20.0, 20.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 20.0),
        ];
        let ordered = order_points_clockwise(shuffled);
        assert_eq!(ordered[0], Point::new(10.0, 10.0));
        assert_eq!(ordered[1], Point::new(20.0, 10.0));
        assert_eq!(ordered[2], Point::new(20.0, 20.0));
        assert_eq!(ordered[3], Point::new(10.0, 20.0));
    }

    #[test]
    fn test_simplify_chain_removes_straight_runs() {
        let chain = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(0.0, 1.0),
        ];
        assert_eq!(simplify_chain(&chain).len(), 4);
    }

    #[test]
    fn test_unclip_grows_with_ratio() {
        let base = square(10.0, 10.0, 20.0);
        let small = BoundingBox::new(unclip(&base, 1.5).unwrap()).area();
        let large = BoundingBox::new(unclip(&base, 2.5).unwrap()).area();
        assert!(small > 400.0);
        assert!(large > small);
    }

    #[test]
    fn test_unclip_zero_area_is_degenerate() {
        let flat = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        ];
        assert!(matches!(
            unclip(&flat, 1.5),
            Err(OCRError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_scanline_counts_interior_pixels() {
        let pred = ndarray::Array2::<f32>::ones((10, 10));
        let poly = square(2.0, 2.0, 4.0);
        let mut buf = ScanlineBuffer::new(poly.len());
        let (sum, count) = buf.process_scanline(3, &poly, &pred.view());
        assert_eq!(count, 5);
        assert!((sum - 5.0).abs() < 1e-6);
        let (_, outside) = buf.process_scanline(8, &poly, &pred.view());
        assert_eq!(outside, 0);
    }
}
