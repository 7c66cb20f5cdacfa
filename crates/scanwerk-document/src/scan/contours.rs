// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction: border following on the edge map, area ranking,
// Douglas-Peucker simplification, and document quadrilateral selection.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use scanwerk_core::{Contour, DetectionResult, PipelineConfig, Point2D, Quadrilateral};
use tracing::{debug, info, instrument};

/// Finds the document boundary in a binary edge map.
#[derive(Debug, Clone, Copy)]
pub struct ContourExtractor {
    max_candidates: usize,
    epsilon_ratio: f64,
    min_area: f64,
}

impl ContourExtractor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            max_candidates: config.max_candidates,
            epsilon_ratio: config.approx_epsilon_ratio,
            min_area: config.min_contour_area,
        }
    }

    /// The largest outer boundaries of `edges`, biggest enclosed area first,
    /// truncated to the configured candidate count.
    pub fn candidates(&self, edges: &GrayImage) -> Vec<Contour> {
        self.rank(extract_contours(edges))
    }

    fn rank(&self, mut contours: Vec<Contour>) -> Vec<Contour> {
        contours.sort_by(|a, b| b.area().total_cmp(&a.area()));
        contours.truncate(self.max_candidates);
        contours
    }

    /// Return the first of the top candidates that simplifies to four
    /// vertices and encloses more than the area floor.
    #[instrument(skip_all, fields(width = edges.width(), height = edges.height()))]
    pub fn find_document(&self, edges: &GrayImage) -> DetectionResult {
        self.select_document(extract_contours(edges))
    }

    /// [`ContourExtractor::find_document`] over contours the caller has
    /// already traced with [`extract_contours`].
    pub fn select_document(&self, contours: Vec<Contour>) -> DetectionResult {
        let candidates = self.rank(contours);
        debug!(candidates = candidates.len(), "Ranked contour candidates");

        for (rank, contour) in candidates.iter().enumerate() {
            let epsilon = self.epsilon_ratio * contour.perimeter();
            let polygon = approximate_polygon(contour.points(), epsilon);
            let area = contour.area();
            debug!(rank, vertices = polygon.len(), area, epsilon, "Candidate simplified");

            if polygon.len() != 4 || area <= self.min_area {
                continue;
            }
            match Quadrilateral::new([polygon[0], polygon[1], polygon[2], polygon[3]]) {
                Ok(quad) => {
                    info!(rank, area, "Document quadrilateral found");
                    return DetectionResult::Found(quad);
                }
                Err(err) => debug!(rank, error = %err, "Rejected degenerate quadrilateral"),
            }
        }

        info!("No document quadrilateral among candidates");
        DetectionResult::NotFound
    }
}

/// Trace every outer border in a binary image as a flat list.
///
/// Hole borders are dropped; nesting is ignored, so a box drawn inside the
/// page is listed next to the page outline rather than beneath it.
pub fn extract_contours(edges: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| {
            Contour::new(
                c.points
                    .iter()
                    .map(|p| Point2D::new(p.x as f64, p.y as f64))
                    .collect(),
            )
        })
        .collect()
}

/// Simplify a closed curve with Douglas-Peucker.
///
/// The curve is first split at two mutually distant points, which are always
/// kept, so the result does not depend on where border following started.
pub fn approximate_polygon(curve: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    let n = curve.len();
    if n <= 3 {
        return curve.to_vec();
    }

    let farthest_from = |origin: usize| -> usize {
        (0..n)
            .max_by(|&a, &b| {
                curve[origin]
                    .distance(&curve[a])
                    .total_cmp(&curve[origin].distance(&curve[b]))
            })
            .unwrap_or(origin)
    };
    let start = farthest_from(0);
    let split = farthest_from(start);
    if start == split {
        return vec![curve[start]];
    }

    // Rotate so the curve starts at `start`; `split` lands at `offset`.
    let rotated: Vec<Point2D> = (0..n).map(|i| curve[(start + i) % n]).collect();
    let offset = (split + n - start) % n;

    let mut keep = vec![false; n + 1];
    keep[0] = true;
    keep[offset] = true;
    keep[n] = true;

    // Closing chain runs from `offset` back around to index 0 (stored as n).
    let point_at = |i: usize| rotated[i % n];
    let mut stack = vec![(0usize, offset), (offset, n)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }
        let (a, b) = (point_at(first), point_at(last));
        let mut max_dist = -1.0;
        let mut index = first;
        for i in (first + 1)..last {
            let d = perpendicular_distance(point_at(i), a, b);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    (0..n).filter(|&i| keep[i]).map(|i| rotated[i]).collect()
}

/// Distance from `p` to the line through `a` and `b` (or to `a` when the
/// segment is degenerate).
fn perpendicular_distance(p: Point2D, a: Point2D, b: Point2D) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len < f64::EPSILON {
        return p.distance(&a);
    }
    ((p.x - a.x) * dy - (p.y - a.y) * dx).abs() / len
}
