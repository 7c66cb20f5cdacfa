// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification: corner canonicalisation, target size, the
// four-point homography solve, and the inverse-mapped bilinear warp.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use scanwerk_core::error::ScanwerkError;
use scanwerk_core::{Point2D, Quadrilateral};
use tracing::{debug, info, instrument};

pub use scanwerk_core::order_points;

/// Triples whose normalised cross product falls below this are collinear.
const COLLINEAR_EPS: f64 = 1e-9;

/// A 3x3 projective transform with `h33 = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the 8x8 linear system mapping four `src` points onto four `dst`
    /// points.
    ///
    /// Fails with [`ScanwerkError::Geometry`] when either set has three
    /// collinear (or coincident) points, or the system is otherwise singular.
    pub fn from_correspondences(
        src: &[Point2D; 4],
        dst: &[Point2D; 4],
    ) -> Result<Self, ScanwerkError> {
        ensure_general_position(src, "source")?;
        ensure_general_position(dst, "destination")?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (u, v) = (dst[i].x, dst[i].y);
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -x * u;
            a[(r, 7)] = -y * u;
            b[r] = u;
            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -x * v;
            a[(r + 1, 7)] = -y * v;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| ScanwerkError::Geometry("homography system is singular".into()))?;
        if h.iter().any(|c| !c.is_finite()) {
            return Err(ScanwerkError::Geometry(
                "homography solve produced non-finite coefficients".into(),
            ));
        }

        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Map a point through the transform.
    pub fn apply(&self, p: Point2D) -> Option<Point2D> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        if v[2].abs() < f64::EPSILON || !v[2].is_finite() {
            return None;
        }
        Some(Point2D::new(v[0] / v[2], v[1] / v[2]))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix
            .try_inverse()
            .map(|m| Self { matrix: m / m[(2, 2)] })
            .filter(|h| h.matrix.iter().all(|c| c.is_finite()))
    }

    fn to_projection(self) -> Result<Projection, ScanwerkError> {
        let m = self.matrix;
        let coefficients = [
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
        ];
        Projection::from_matrix(coefficients)
            .ok_or_else(|| ScanwerkError::Geometry("homography is not invertible".into()))
    }
}

fn ensure_general_position(points: &[Point2D; 4], which: &str) -> Result<(), ScanwerkError> {
    for i in 0..4 {
        for j in (i + 1)..4 {
            for k in (j + 1)..4 {
                let (a, b, c) = (points[i], points[j], points[k]);
                let (abx, aby) = (b.x - a.x, b.y - a.y);
                let (acx, acy) = (c.x - a.x, c.y - a.y);
                let scale = abx.hypot(aby) * acx.hypot(acy);
                let cross = (abx * acy - aby * acx).abs();
                if scale < COLLINEAR_EPS || cross / scale < COLLINEAR_EPS {
                    return Err(ScanwerkError::Geometry(format!(
                        "{which} points {i}, {j}, {k} are collinear or coincident"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Output size for a canonical quadrilateral: the longer of each pair of
/// opposing edges, rounded down.
pub fn target_size(quad: &Quadrilateral) -> Result<(u32, u32), ScanwerkError> {
    let [tl, tr, br, bl] = *quad.corners();
    let width = tl.distance(&tr).max(bl.distance(&br)).floor();
    let height = tl.distance(&bl).max(tr.distance(&br)).floor();
    if width < 1.0 || height < 1.0 {
        return Err(ScanwerkError::Geometry(format!(
            "rectified size {width}x{height} has zero area"
        )));
    }
    Ok((width as u32, height as u32))
}

/// Flattens a photographed document to a frontal view.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveRectifier;

impl PerspectiveRectifier {
    pub fn new() -> Self {
        Self
    }

    /// Canonicalise four arbitrarily ordered corners and rectify.
    pub fn four_point_transform(
        &self,
        image: &DynamicImage,
        corners: [Point2D; 4],
    ) -> Result<DynamicImage, ScanwerkError> {
        let quad = Quadrilateral::new(corners)?;
        self.rectify(image, &quad)
    }

    /// Warp the region inside `quad` onto an axis-aligned rectangle.
    ///
    /// Grayscale input stays grayscale; anything else is warped as RGB.
    /// Pixels that map outside the source are filled white.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn rectify(
        &self,
        image: &DynamicImage,
        quad: &Quadrilateral,
    ) -> Result<DynamicImage, ScanwerkError> {
        let (out_w, out_h) = target_size(quad)?;
        let dst = [
            Point2D::new(0.0, 0.0),
            Point2D::new((out_w - 1) as f64, 0.0),
            Point2D::new((out_w - 1) as f64, (out_h - 1) as f64),
            Point2D::new(0.0, (out_h - 1) as f64),
        ];
        let homography = Homography::from_correspondences(quad.corners(), &dst)?;
        debug!(matrix = ?homography.matrix(), "Homography solved");
        let projection = homography.to_projection()?;

        let warped = match image {
            DynamicImage::ImageLuma8(gray) => {
                let mut out = GrayImage::new(out_w, out_h);
                warp_into(gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut out);
                DynamicImage::ImageLuma8(out)
            }
            other => {
                let rgb = other.to_rgb8();
                let mut out = RgbImage::new(out_w, out_h);
                warp_into(
                    &rgb,
                    &projection,
                    Interpolation::Bilinear,
                    Rgb([255u8, 255, 255]),
                    &mut out,
                );
                DynamicImage::ImageRgb8(out)
            }
        };

        info!(out_w, out_h, "Perspective correction applied");
        Ok(warped)
    }
}
