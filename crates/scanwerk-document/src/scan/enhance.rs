// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR-ready enhancement: adaptive binarization, non-local-means cleanup of
// thresholding speckle, and a 3x3 sharpening pass.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use scanwerk_core::config::{ThresholdMethod, kernel_sigma};
use scanwerk_core::PipelineConfig;
use tracing::{debug, info, instrument};

use crate::image::sampling::gray_at;
use crate::scan::denoise::non_local_means;

/// Turns a rectified (or fallback) page into a crisp single-channel image.
#[derive(Debug, Clone, Copy)]
pub struct ImageEnhancer {
    block_size: u32,
    offset: f32,
    method: ThresholdMethod,
    template_window: u32,
    search_window: u32,
    strength: f32,
    center_weight: f32,
}

impl ImageEnhancer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            block_size: config.threshold_block_size,
            offset: config.threshold_offset,
            method: config.threshold_method,
            template_window: config.denoise_template_window,
            search_window: config.denoise_search_window,
            strength: config.denoise_strength,
            center_weight: config.sharpen_center_weight,
        }
    }

    /// Run the full enhancement chain:
    ///
    /// 1. Convert to grayscale
    /// 2. Adaptive threshold (block 11, offset 2 by default)
    /// 3. Non-local-means denoising (7 / 21 / 10)
    /// 4. Sharpen (centre 9, neighbours -1)
    ///
    /// Always returns a `Luma8` image the same size as the input.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn enhance(&self, image: &DynamicImage) -> DynamicImage {
        info!("Running scan enhancement");

        let gray = image.to_luma8();
        let binary = self.binarize(&gray);
        let denoised = non_local_means(
            &binary,
            self.template_window,
            self.search_window,
            self.strength,
        );
        let sharpened = sharpen(&denoised, self.center_weight);

        debug!("Enhancement complete");
        DynamicImage::ImageLuma8(sharpened)
    }

    /// Local adaptive threshold: a pixel becomes white when it is brighter
    /// than its neighbourhood mean minus the offset, black otherwise.
    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let radius = self.block_size / 2;

        match self.method {
            ThresholdMethod::Gaussian => {
                let local = gaussian_blur_f32(gray, kernel_sigma(self.block_size));
                GrayImage::from_fn(width, height, |x, y| {
                    let threshold = local.get_pixel(x, y).0[0] as f32 - self.offset;
                    binary_pixel(gray.get_pixel(x, y).0[0] as f32 > threshold)
                })
            }
            ThresholdMethod::Mean => {
                let sums = WindowSums::new(gray);
                GrayImage::from_fn(width, height, |x, y| {
                    let threshold = sums.block_mean(x, y, radius) as f32 - self.offset;
                    binary_pixel(gray.get_pixel(x, y).0[0] as f32 > threshold)
                })
            }
        }
    }
}

#[inline]
fn binary_pixel(white: bool) -> Luma<u8> {
    Luma([if white { 255 } else { 0 }])
}

/// 3x3 sharpening: `center_weight * p` minus the eight neighbours, with
/// replicated borders and saturation to 0..=255.
pub fn sharpen(gray: &GrayImage, center_weight: f32) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let (cx, cy) = (x as i64, y as i64);
        let mut neighbours = 0f32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx != 0 || dy != 0 {
                    neighbours += gray_at(gray, cx + dx, cy + dy) as f32;
                }
            }
        }
        let center = gray.get_pixel(x, y).0[0] as f32;
        Luma([(center_weight * center - neighbours).round().clamp(0.0, 255.0) as u8])
    })
}

/// Summed-area table backing the mean threshold window.
struct WindowSums {
    width: u32,
    height: u32,
    /// `(width + 1) x (height + 1)`, first row and column zero.
    table: Vec<u64>,
}

impl WindowSums {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut table = vec![0u64; stride * (height as usize + 1)];
        for (y, row) in gray.rows().enumerate() {
            let mut running = 0u64;
            for (x, px) in row.enumerate() {
                running += px.0[0] as u64;
                table[(y + 1) * stride + x + 1] = running + table[y * stride + x + 1];
            }
        }
        Self {
            width,
            height,
            table,
        }
    }

    /// Mean of the `(2r+1)`-square block centred on `(x, y)`. Blocks that
    /// overhang the page are averaged over the part that lies on it.
    fn block_mean(&self, x: u32, y: u32, r: u32) -> f64 {
        let stride = self.width as usize + 1;
        let (x0, y0) = (x.saturating_sub(r) as usize, y.saturating_sub(r) as usize);
        let x1 = (x + r + 1).min(self.width) as usize;
        let y1 = (y + r + 1).min(self.height) as usize;
        let sum = self.table[y1 * stride + x1] + self.table[y0 * stride + x0]
            - self.table[y0 * stride + x1]
            - self.table[y1 * stride + x0];
        sum as f64 / ((x1 - x0) * (y1 - y0)) as f64
    }
}
