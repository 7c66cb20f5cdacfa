// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shadow removal: contrast-limited adaptive histogram equalisation (CLAHE)
// applied to the lightness channel of CIE L*a*b*, leaving chroma untouched.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use scanwerk_core::PipelineConfig;
use tracing::{debug, info, instrument};

const BINS: usize = 256;

// D65 reference white.
const XN: f32 = 0.950_456;
const ZN: f32 = 1.088_754;

/// Flattens uneven illumination across a photographed page.
#[derive(Debug, Clone, Copy)]
pub struct ShadowRemover {
    clip_limit: f32,
    tile_grid: u32,
}

impl ShadowRemover {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            clip_limit: config.clahe_clip_limit,
            tile_grid: config.clahe_tile_grid,
        }
    }

    /// Equalise lightness locally. Grayscale input is equalised directly and
    /// stays grayscale; anything else is processed and returned as RGB.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn remove(&self, image: &DynamicImage) -> DynamicImage {
        info!(clip_limit = self.clip_limit, tile_grid = self.tile_grid, "Removing shadows");
        match image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(self.clahe(gray)),
            other => DynamicImage::ImageRgb8(self.remove_rgb(&other.to_rgb8())),
        }
    }

    fn remove_rgb(&self, rgb: &RgbImage) -> RgbImage {
        let linear = srgb_linear_table();
        let (width, height) = rgb.dimensions();

        let mut chroma = vec![(0f32, 0f32); (width * height) as usize];
        let lightness = GrayImage::from_fn(width, height, |x, y| {
            let [l, a, b] = rgb_to_lab(rgb.get_pixel(x, y), &linear);
            chroma[(y * width + x) as usize] = (a, b);
            Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
        });

        let equalised = self.clahe(&lightness);
        RgbImage::from_fn(width, height, |x, y| {
            let (a, b) = chroma[(y * width + x) as usize];
            let l = equalised.get_pixel(x, y).0[0] as f32 * 100.0 / 255.0;
            lab_to_rgb([l, a, b])
        })
    }

    /// Contrast-limited adaptive histogram equalisation.
    ///
    /// The image is split into a `tile_grid x tile_grid` grid (fewer tiles
    /// when the image is smaller than the grid). Each tile's histogram is
    /// clipped at `clip_limit * tile_area / 256`, the excess spread over all
    /// bins, and its CDF becomes a lookup table. Output pixels blend the four
    /// nearest tile tables bilinearly.
    pub fn clahe(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return gray.clone();
        }
        let nx = self.tile_grid.min(width).max(1);
        let ny = self.tile_grid.min(height).max(1);
        let x_bounds = tile_bounds(width, nx);
        let y_bounds = tile_bounds(height, ny);

        let mut luts = Vec::with_capacity((nx * ny) as usize);
        for ty in 0..ny as usize {
            for tx in 0..nx as usize {
                let (x0, x1) = (x_bounds[tx], x_bounds[tx + 1]);
                let (y0, y1) = (y_bounds[ty], y_bounds[ty + 1]);
                let mut hist = [0u32; BINS];
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                    }
                }
                luts.push(tile_lut(hist, (x1 - x0) * (y1 - y0), self.clip_limit));
            }
        }
        debug!(tiles_x = nx, tiles_y = ny, "Tile lookup tables built");

        let tile_w = width as f32 / nx as f32;
        let tile_h = height as f32 / ny as f32;
        let lut = |tx: usize, ty: usize| &luts[ty * nx as usize + tx];

        GrayImage::from_fn(width, height, |x, y| {
            let (tx0, tx1, fx) = neighbour_tiles(x, tile_w, nx);
            let (ty0, ty1, fy) = neighbour_tiles(y, tile_h, ny);
            let v = gray.get_pixel(x, y).0[0] as usize;

            let top = (1.0 - fx) * lut(tx0, ty0)[v] as f32 + fx * lut(tx1, ty0)[v] as f32;
            let bottom = (1.0 - fx) * lut(tx0, ty1)[v] as f32 + fx * lut(tx1, ty1)[v] as f32;
            Luma([((1.0 - fy) * top + fy * bottom).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// `tiles + 1` integer boundaries splitting `len` pixels as evenly as possible.
fn tile_bounds(len: u32, tiles: u32) -> Vec<u32> {
    (0..=tiles)
        .map(|i| (i as u64 * len as u64 / tiles as u64) as u32)
        .collect()
}

/// The two tiles whose centres bracket `pos`, and the blend weight of the second.
fn neighbour_tiles(pos: u32, tile_size: f32, tiles: u32) -> (usize, usize, f32) {
    let t = (pos as f32 + 0.5) / tile_size - 0.5;
    let lower = t.floor();
    let frac = t - lower;
    let last = tiles as i64 - 1;
    let t0 = (lower as i64).clamp(0, last) as usize;
    let t1 = (lower as i64 + 1).clamp(0, last) as usize;
    (t0, t1, frac)
}

fn tile_lut(mut hist: [u32; BINS], area: u32, clip_limit: f32) -> [u8; BINS] {
    let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess - batch * BINS as u32;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (BINS as u32 / residual).max(1) as usize;
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (value, count) in lut.iter_mut().zip(hist) {
        cdf += count;
        *value = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

// -- Colour conversion --------------------------------------------------------

fn srgb_linear_table() -> [f32; 256] {
    let mut table = [0f32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = srgb_to_linear(i as f32 / 255.0);
    }
    table
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn lab_f_inv(t: f32) -> f32 {
    if t > 6.0 / 29.0 {
        t * t * t
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

/// sRGB pixel to `[L*, a*, b*]` with L* in 0..=100.
fn rgb_to_lab(px: &Rgb<u8>, linear: &[f32; 256]) -> [f32; 3] {
    let [r, g, b] = px.0.map(|c| linear[c as usize]);
    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / XN;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / ZN;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > 0.008_856 { 116.0 * fy - 16.0 } else { 903.3 * y };
    [l, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn lab_to_rgb([l, a, b]: [f32; 3]) -> Rgb<u8> {
    let fy = (l + 16.0) / 116.0;
    let x = lab_f_inv(fy + a / 500.0) * XN;
    let y = if l > 8.0 { fy * fy * fy } else { l / 903.3 };
    let z = lab_f_inv(fy - b / 200.0) * ZN;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_992 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;
    Rgb([r, g, bl].map(|c| (linear_to_srgb(c) * 255.0).round().clamp(0.0, 255.0) as u8))
}
