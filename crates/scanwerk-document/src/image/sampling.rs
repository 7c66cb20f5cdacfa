// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resampling helpers shared by the pipeline stages: working-copy resize,
// border-replicating pixel access, and bicubic interpolation.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel};
use tracing::debug;

/// Cubic convolution coefficient (the common "-0.75" variant).
const CUBIC_A: f64 = -0.75;

/// Resize `image` to `height` pixels tall, preserving aspect ratio.
///
/// Short images are upscaled, so the working copy always has the same
/// height and a fixed contour area floor means the same thing for every
/// input.
pub fn resize_to_height(image: &DynamicImage, height: u32) -> DynamicImage {
    if image.height() == height {
        return image.clone();
    }
    let ratio = image.height() as f64 / height as f64;
    let width = ((image.width() as f64 / ratio).round() as u32).max(1);
    debug!(
        from_w = image.width(),
        from_h = image.height(),
        to_w = width,
        to_h = height,
        "Resizing working copy"
    );
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Read a pixel of a grayscale image with coordinates clamped to the border.
#[inline]
pub fn gray_at(image: &GrayImage, x: i64, y: i64) -> u8 {
    let cx = x.clamp(0, image.width() as i64 - 1) as u32;
    let cy = y.clamp(0, image.height() as i64 - 1) as u32;
    image.get_pixel(cx, cy).0[0]
}

/// Cubic convolution weights for the four taps around a fractional offset `t`.
#[inline]
fn cubic_weights(t: f64) -> [f64; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let w2 = ((a + 2.0) * (1.0 - t) - (a + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}

/// Bicubic sample at `(x, y)` with replicated borders.
pub fn sample_bicubic<P>(image: &ImageBuffer<P, Vec<u8>>, x: f64, y: f64) -> P
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor();
    let y0 = y.floor();
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 4];
    for (j, wyj) in wy.iter().enumerate() {
        let sy = (y0 - 1 + j as i64).clamp(0, h - 1) as u32;
        for (i, wxi) in wx.iter().enumerate() {
            let sx = (x0 - 1 + i as i64).clamp(0, w - 1) as u32;
            let weight = wxi * wyj;
            let px = image.get_pixel(sx, sy).channels();
            for c in 0..channels {
                acc[c] += weight * px[c] as f64;
            }
        }
    }

    let mut out = *image.get_pixel(0, 0);
    for (c, value) in out.channels_mut().iter_mut().enumerate() {
        *value = acc[c].round().clamp(0.0, 255.0) as u8;
    }
    out
}
