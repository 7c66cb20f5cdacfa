// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew correction: Hough line voting on a Canny edge map, median line angle,
// and a bicubic rotation about the image centre.

use image::{DynamicImage, ImageBuffer, Pixel, Rgb};
use imageproc::edges::canny;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use scanwerk_core::PipelineConfig;
use tracing::{debug, info, instrument};

use crate::image::sampling::sample_bicubic;

/// Rotations smaller than this are not worth a resample.
const MIN_CORRECTION_DEG: f64 = 0.05;

/// Estimates the dominant text-line angle and levels the page.
#[derive(Debug, Clone, Copy)]
pub struct SkewCorrector {
    canny_low: f32,
    canny_high: f32,
    vote_threshold: u32,
    suppression_radius: u32,
}

impl SkewCorrector {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            canny_low: config.skew_canny_low,
            canny_high: config.skew_canny_high,
            vote_threshold: config.skew_vote_threshold,
            suppression_radius: config.skew_suppression_radius,
        }
    }

    /// Median line angle in degrees, positive when lines descend to the right.
    ///
    /// `None` when no line gathers enough votes. Votes are binned per whole
    /// degree, so a line lying about halfway between two bins splits its
    /// votes and can fall under the threshold however long it is.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn estimate_skew(&self, image: &DynamicImage) -> Option<f64> {
        let gray = image.to_luma8();
        let edges = canny(&gray, self.canny_low, self.canny_high);
        let lines = detect_lines(
            &edges,
            LineDetectionOptions {
                vote_threshold: self.vote_threshold,
                suppression_radius: self.suppression_radius,
            },
        );
        debug!(line_count = lines.len(), "Hough lines detected");

        let mut angles: Vec<f64> = lines.iter().map(line_angle).collect();
        let angle = median(&mut angles)?;
        debug!(angle, "Median line angle");
        Some(angle)
    }

    /// Rotate `image` so its dominant lines become horizontal.
    ///
    /// Returns the image unchanged alongside `None` when no lines were found.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn correct(&self, image: &DynamicImage) -> (DynamicImage, Option<f64>) {
        let Some(angle) = self.estimate_skew(image) else {
            info!("No lines detected; skipping skew correction");
            return (image.clone(), None);
        };

        if angle.abs() < MIN_CORRECTION_DEG {
            debug!(angle, "Skew negligible; no resample");
            return (image.clone(), Some(angle));
        }

        info!(angle, "Correcting skew");
        (rotate(image, -angle), Some(angle))
    }
}

/// Normalise a Hough normal angle to the line's own slope: horizontal is 0.
fn line_angle(line: &PolarLine) -> f64 {
    line.angle_in_degrees as f64 - 90.0
}

/// Median of `values`; the mean of the two middle values for an even count.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Rotate `image` by `angle_deg` about its centre, clockwise on screen for
/// positive angles. Output keeps the input size; borders are replicated.
///
/// Grayscale stays grayscale, everything else comes back as RGB.
pub fn rotate(image: &DynamicImage, angle_deg: f64) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(rotate_buffer(gray, angle_deg)),
        other => DynamicImage::ImageRgb8(rotate_buffer::<Rgb<u8>>(&other.to_rgb8(), angle_deg)),
    }
}

fn rotate_buffer<P>(src: &ImageBuffer<P, Vec<u8>>, angle_deg: f64) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = src.dimensions();
    let (cx, cy) = ((w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0);
    let (sin, cos) = angle_deg.to_radians().sin_cos();

    // Inverse map: destination p samples the source at c + R(-angle)(p - c).
    ImageBuffer::from_fn(w, h, |x, y| {
        let (dx, dy) = (x as f64 - cx, y as f64 - cy);
        let sx = cx + cos * dx + sin * dy;
        let sy = cy - sin * dx + cos * dy;
        sample_bicubic(src, sx, sy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// White page with long dark horizontal bars, rotated by `angle`.
    fn ruled_page(angle: f64) -> DynamicImage {
        let page = GrayImage::from_fn(900, 900, |x, y| {
            let bar = (150..750).contains(&x) && (200..700).contains(&y) && (y - 200) % 60 < 8;
            Luma([if bar { 20 } else { 245 }])
        });
        rotate(&DynamicImage::ImageLuma8(page), angle)
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, -1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn horizontal_normal_is_zero_degrees() {
        let line = PolarLine { r: 10.0, angle_in_degrees: 90 };
        assert_eq!(line_angle(&line), 0.0);
        let tilted = PolarLine { r: 10.0, angle_in_degrees: 97 };
        assert_eq!(line_angle(&tilted), 7.0);
    }

    #[test]
    fn rotation_preserves_size_and_flat_content() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([123u8])));
        let out = rotate(&img, 17.0);
        assert_eq!((out.width(), out.height()), (40, 30));
        assert!(out.to_luma8().pixels().all(|p| p.0[0] == 123));
    }

    #[test]
    fn zero_rotation_is_identity() {
        let img = GrayImage::from_fn(33, 21, |x, y| Luma([((x * 7 + y * 11) % 256) as u8]));
        let out = rotate(&DynamicImage::ImageLuma8(img.clone()), 0.0);
        assert_eq!(out.to_luma8(), img);
    }

    #[test]
    fn estimates_and_corrects_known_angles() {
        let corrector = SkewCorrector::new(&PipelineConfig::default());
        for angle in [-20.0, 7.0, 25.0] {
            let page = ruled_page(angle);
            let estimate = corrector.estimate_skew(&page).expect("lines expected");
            assert!((estimate - angle).abs() <= 2.0, "estimated {estimate} for {angle}");

            let (levelled, applied) = corrector.correct(&page);
            assert_eq!(applied, Some(estimate));
            let residual = corrector.estimate_skew(&levelled).expect("lines expected");
            assert!(residual.abs() <= 2.0, "residual {residual} after correcting {angle}");
        }
    }

    #[test]
    fn fractional_angles_snap_to_the_nearest_degree() {
        let corrector = SkewCorrector::new(&PipelineConfig::default());
        for angle in [4.1, -11.9] {
            let page = ruled_page(angle);
            let estimate = corrector.estimate_skew(&page).expect("lines expected");
            assert!((estimate - angle).abs() <= 1.0, "estimated {estimate} for {angle}");

            let (levelled, _) = corrector.correct(&page);
            let residual = corrector.estimate_skew(&levelled).unwrap_or(0.0);
            assert!(residual.abs() <= 2.0, "residual {residual} after correcting {angle}");
        }
    }

    #[test]
    fn half_degree_page_is_never_made_worse() {
        // -2.5 sits between the -2 and -3 bins, so the bars may fall short of
        // the vote threshold. Either the page comes back untouched or levelled.
        let corrector = SkewCorrector::new(&PipelineConfig::default());
        let page = ruled_page(-2.5);
        let (out, applied) = corrector.correct(&page);
        match applied {
            None => assert_eq!(out, page),
            Some(angle) => assert!((angle + 2.5).abs() <= 2.0),
        }
    }

    #[test]
    fn blank_page_is_untouched() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 150, Luma([250u8])));
        let corrector = SkewCorrector::new(&PipelineConfig::default());
        assert_eq!(corrector.estimate_skew(&img), None);
        let (out, angle) = corrector.correct(&img);
        assert_eq!(angle, None);
        assert_eq!(out, img);
    }
}
