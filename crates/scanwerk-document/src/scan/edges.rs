// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge detection: grayscale conversion, Gaussian smoothing, and Canny.

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use scanwerk_core::PipelineConfig;
use tracing::{debug, instrument};

/// Produces the binary edge map used to look for a document boundary.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    sigma: f32,
    low: f32,
    high: f32,
}

impl EdgeDetector {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            sigma: config.blur_sigma(),
            low: config.canny_low,
            high: config.canny_high,
        }
    }

    /// Grayscale, blur, and run Canny. Output is 0/255 with the input's
    /// dimensions; an all-black map is a valid result.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.sigma);
        let edges = canny(&blurred, self.low, self.high);
        debug!(
            edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count(),
            sigma = self.sigma,
            low = self.low,
            high = self.high,
            "Canny edge detection complete"
        );
        edges
    }
}
