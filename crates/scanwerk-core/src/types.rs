// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk document pipeline.

use std::cmp::Ordering;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Corners closer than this are treated as coincident.
const COINCIDENT_EPS: f64 = 1e-6;

/// A floating-point coordinate in image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Multiply both coordinates by `ratio`.
    pub fn scaled(&self, ratio: f64) -> Self {
        Self::new(self.x * ratio, self.y * ratio)
    }

    pub fn as_f32(&self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// A closed boundary traced from an edge map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    points: Vec<Point2D>,
}

impl Contour {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the closed boundary, including the closing segment.
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Enclosed area (absolute shoelace value).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }
}

/// Absolute area of a simple polygon via the shoelace formula.
pub fn polygon_area(points: &[Point2D]) -> f64 {
    signed_area(points).abs()
}

fn signed_area(points: &[Point2D]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    twice / 2.0
}

/// Canonicalise four corners as `[top-left, top-right, bottom-right, bottom-left]`.
///
/// Top-left has the smallest `x + y`, bottom-right the largest. Of the other
/// two, top-right has the smaller `y - x`. Ties are broken on the coordinates
/// themselves, so the result depends only on the set of points and never on
/// their input order.
///
/// Assumes the document is within roughly 45° of axis-aligned. Beyond that
/// the sum/difference rule can pair adjacent corners as opposites.
pub fn order_points(points: [Point2D; 4]) -> [Point2D; 4] {
    let by_sum = |a: &Point2D, b: &Point2D| {
        (a.x + a.y)
            .total_cmp(&(b.x + b.y))
            .then_with(|| a.y.total_cmp(&b.y))
            .then_with(|| a.x.total_cmp(&b.x))
    };

    let mut sorted = points;
    sorted.sort_by(by_sum);
    let top_left = sorted[0];
    let bottom_right = sorted[3];

    let (a, b) = (sorted[1], sorted[2]);
    let by_diff = |p: &Point2D, q: &Point2D| -> Ordering {
        (p.y - p.x)
            .total_cmp(&(q.y - q.x))
            .then_with(|| p.y.total_cmp(&q.y))
            .then_with(|| p.x.total_cmp(&q.x))
    };
    let (top_right, bottom_left) = match by_diff(&a, &b) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    };

    [top_left, top_right, bottom_right, bottom_left]
}

/// Four corners of a detected document in canonical order.
///
/// Index 0 is top-left, 1 top-right, 2 bottom-right, 3 bottom-left. Only
/// constructible through [`Quadrilateral::new`], which canonicalises the
/// corners and rejects coincident corners or a non-positive area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quadrilateral {
    corners: [Point2D; 4],
}

impl Quadrilateral {
    pub fn new(points: [Point2D; 4]) -> Result<Self> {
        let corners = order_points(points);
        for i in 0..4 {
            for j in (i + 1)..4 {
                if corners[i].distance(&corners[j]) < COINCIDENT_EPS {
                    return Err(ScanwerkError::Geometry(format!(
                        "coincident corners at ({:.2}, {:.2})",
                        corners[i].x, corners[i].y
                    )));
                }
            }
        }
        let area = polygon_area(&corners);
        if !(area > COINCIDENT_EPS) {
            return Err(ScanwerkError::Geometry(format!(
                "quadrilateral encloses no area ({area})"
            )));
        }
        Ok(Self { corners })
    }

    pub fn corners(&self) -> &[Point2D; 4] {
        &self.corners
    }

    pub fn top_left(&self) -> Point2D {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point2D {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point2D {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point2D {
        self.corners[3]
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.corners)
    }

    /// Map the corners from working resolution back to native resolution.
    ///
    /// A positive uniform scale preserves the canonical order.
    pub fn scaled(&self, ratio: f64) -> Self {
        Self {
            corners: self.corners.map(|p| p.scaled(ratio)),
        }
    }
}

/// Outcome of looking for a document boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Found(Quadrilateral),
    NotFound,
}

impl DetectionResult {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// The enhanced (and, when detection succeeded, rectified) artifact.
    pub image: DynamicImage,
    /// `true` when no usable quadrilateral was found and the unrectified
    /// image was enhanced instead.
    pub fallback_used: bool,
    /// Detected document corners in native-resolution coordinates.
    pub quadrilateral: Option<Quadrilateral>,
    /// Skew angle (degrees) removed by the post-pass, if any lines were found.
    pub skew_angle_deg: Option<f64>,
}

impl ScanOutcome {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Downstream text-recognition collaborator.
///
/// Receives the pipeline's artifact and returns UTF-8 text, which may be
/// empty when nothing legible was found.
pub trait TextRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    /// Heap's algorithm over the 24 orderings of four items.
    fn permutations(items: [Point2D; 4]) -> Vec<[Point2D; 4]> {
        fn heap(k: usize, arr: &mut [Point2D; 4], out: &mut Vec<[Point2D; 4]>) {
            if k == 1 {
                out.push(*arr);
                return;
            }
            heap(k - 1, arr, out);
            for i in 0..k - 1 {
                if k % 2 == 0 {
                    arr.swap(i, k - 1);
                } else {
                    arr.swap(0, k - 1);
                }
                heap(k - 1, arr, out);
            }
        }
        let mut arr = items;
        let mut out = Vec::with_capacity(24);
        heap(4, &mut arr, &mut out);
        out
    }

    fn segments_cross(a: Point2D, b: Point2D, c: Point2D, d: Point2D) -> bool {
        let orient = |p: Point2D, q: Point2D, r: Point2D| {
            (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
        };
        let d1 = orient(c, d, a);
        let d2 = orient(c, d, b);
        let d3 = orient(a, b, c);
        let d4 = orient(a, b, d);
        d1 * d2 < 0.0 && d3 * d4 < 0.0
    }

    #[test]
    fn orders_axis_aligned_rectangle() {
        let ordered = order_points([p(100.0, 80.0), p(0.0, 0.0), p(0.0, 80.0), p(100.0, 0.0)]);
        assert_eq!(
            ordered,
            [p(0.0, 0.0), p(100.0, 0.0), p(100.0, 80.0), p(0.0, 80.0)]
        );
    }

    #[test]
    fn ordering_is_permutation_invariant() {
        let corners = [p(31.5, 12.0), p(410.2, 55.7), p(380.9, 530.1), p(12.4, 498.3)];
        let expected = order_points(corners);
        let perms = permutations(corners);
        assert_eq!(perms.len(), 24);
        for perm in perms {
            assert_eq!(order_points(perm), expected, "input {perm:?}");
        }
    }

    #[test]
    fn ordering_with_tied_sums_is_permutation_invariant() {
        // A square rotated by exactly 45 degrees ties every sum/difference.
        let corners = [p(50.0, 0.0), p(100.0, 50.0), p(50.0, 100.0), p(0.0, 50.0)];
        let expected = order_points(corners);
        for perm in permutations(corners) {
            assert_eq!(order_points(perm), expected);
        }
    }

    #[test]
    fn ordered_convex_quads_never_self_intersect() {
        // Perturbed rectangles rotated within the heuristic's working range.
        for step in 0..60 {
            let angle = ((step as f64) - 30.0).to_radians();
            let (w, h) = (200.0 + step as f64 * 3.0, 300.0 - step as f64);
            let jitter = (step % 7) as f64 * 4.0;
            let local = [
                p(-w / 2.0 + jitter, -h / 2.0),
                p(w / 2.0, -h / 2.0 + jitter),
                p(w / 2.0 - jitter, h / 2.0),
                p(-w / 2.0, h / 2.0 - jitter),
            ];
            let (s, c) = angle.sin_cos();
            let world = local.map(|q| p(500.0 + q.x * c - q.y * s, 500.0 + q.x * s + q.y * c));
            let shuffled = [world[2], world[0], world[3], world[1]];
            let [tl, tr, br, bl] = order_points(shuffled);
            assert!(!segments_cross(tl, tr, br, bl), "top/bottom edges cross at step {step}");
            assert!(!segments_cross(tr, br, bl, tl), "left/right edges cross at step {step}");
        }
    }

    #[test]
    fn quadrilateral_rejects_coincident_corners() {
        let err = Quadrilateral::new([p(0.0, 0.0), p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        assert!(matches!(err, Err(ScanwerkError::Geometry(_))));
    }

    #[test]
    fn quadrilateral_rejects_collinear_corners() {
        let err = Quadrilateral::new([p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0)]);
        assert!(matches!(err, Err(ScanwerkError::Geometry(_))));
    }

    #[test]
    fn quadrilateral_scaling_preserves_order() {
        let quad =
            Quadrilateral::new([p(10.0, 10.0), p(110.0, 12.0), p(108.0, 160.0), p(8.0, 158.0)])
                .unwrap();
        let scaled = quad.scaled(2.5);
        assert_eq!(scaled.top_left(), p(25.0, 25.0));
        assert_eq!(scaled.bottom_right(), p(270.0, 400.0));
        assert!((scaled.area() - quad.area() * 6.25).abs() < 1e-6);
    }

    #[test]
    fn contour_perimeter_and_area() {
        let square = Contour::new(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        assert!((square.perimeter() - 40.0).abs() < 1e-12);
        assert!((square.area() - 100.0).abs() < 1e-12);
        assert_eq!(Contour::default().perimeter(), 0.0);
    }
}
