// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Non-local-means denoising for single-channel images.
//
// Every pixel becomes a weighted average of the pixels in its search window,
// weighted by how similar their surrounding patches are. Patch distances are
// computed one search offset at a time from a summed-area table of squared
// differences, so the cost is O(pixels x search window) rather than
// O(pixels x search window x patch).

use image::{GrayImage, Luma};
use tracing::{debug, instrument};

use crate::image::sampling::gray_at;

/// Denoise `image` with patch size `template_window`, search window
/// `search_window` (both odd), and filter strength `h`.
///
/// Weights are `exp(-d² / h²)` where `d²` is the mean squared difference
/// between patches. Borders are replicated.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn non_local_means(
    image: &GrayImage,
    template_window: u32,
    search_window: u32,
    h: f32,
) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, hgt) = (width as usize, height as usize);
    let rt = (template_window / 2) as usize;
    let rs = (search_window / 2) as usize;
    let pad = rt + rs;

    // Replicate-padded copy so every patch and every search offset is in bounds.
    let pw = w + 2 * pad;
    let ph = hgt + 2 * pad;
    let mut padded = vec![0i32; pw * ph];
    for py in 0..ph {
        for px in 0..pw {
            padded[py * pw + px] =
                gray_at(image, px as i64 - pad as i64, py as i64 - pad as i64) as i32;
        }
    }

    // Squared differences are only needed where a patch centred on an output
    // pixel can reach: [rs, rs + w + 2rt) x [rs, rs + h + 2rt) in padded space.
    let rw = w + 2 * rt;
    let rh = hgt + 2 * rt;
    let patch_area = ((2 * rt + 1) * (2 * rt + 1)) as f32;
    let weights = weight_table(h);

    let mut sum_w = vec![0f32; w * hgt];
    let mut sum_v = vec![0f32; w * hgt];
    let mut integral = vec![0u64; (rw + 1) * (rh + 1)];
    let stride = rw + 1;

    for dy in -(rs as isize)..=(rs as isize) {
        for dx in -(rs as isize)..=(rs as isize) {
            // Summed-area table of (P(q) - P(q + offset))² over the region.
            for ry in 0..rh {
                let mut row_sum = 0u64;
                let py = ry + rs;
                let qy = (py as isize + dy) as usize;
                for rx in 0..rw {
                    let px = rx + rs;
                    let qx = (px as isize + dx) as usize;
                    let diff = padded[py * pw + px] - padded[qy * pw + qx];
                    row_sum += (diff * diff) as u64;
                    integral[(ry + 1) * stride + rx + 1] = row_sum + integral[ry * stride + rx + 1];
                }
            }

            for y in 0..hgt {
                for x in 0..w {
                    // Patch centred on (x, y) spans region [x, x + 2rt] x [y, y + 2rt].
                    let (x1, y1) = (x, y);
                    let (x2, y2) = (x + 2 * rt + 1, y + 2 * rt + 1);
                    let ssd = integral[y2 * stride + x2] + integral[y1 * stride + x1]
                        - integral[y1 * stride + x2]
                        - integral[y2 * stride + x1];
                    let d2 = ssd as f32 / patch_area;
                    let weight = weights[(d2.round() as usize).min(weights.len() - 1)];
                    if weight == 0.0 {
                        continue;
                    }
                    let qy = (y + pad) as isize + dy;
                    let qx = (x + pad) as isize + dx;
                    let value = padded[qy as usize * pw + qx as usize] as f32;
                    sum_w[y * w + x] += weight;
                    sum_v[y * w + x] += weight * value;
                }
            }
        }
    }

    let out = GrayImage::from_fn(width, height, |x, y| {
        let i = y as usize * w + x as usize;
        // The zero offset always contributes weight 1, so sum_w >= 1.
        Luma([(sum_v[i] / sum_w[i]).round().clamp(0.0, 255.0) as u8])
    });
    debug!(template_window, search_window, h, "Non-local-means complete");
    out
}

/// `exp(-d² / h²)` for every integer mean squared difference of 8-bit data.
fn weight_table(h: f32) -> Vec<f32> {
    let h2 = (h * h).max(f32::EPSILON);
    (0..=255 * 255)
        .map(|d2| {
            let w = (-(d2 as f32) / h2).exp();
            if w < 1e-6 { 0.0 } else { w }
        })
        .collect()
}
