// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic photographs for end-to-end pipeline tests.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scanwerk_core::Point2D;
use scanwerk_document::scan::Homography;
use scanwerk_document::scan::skew::rotate;

pub const PAPER: u8 = 235;
pub const INK: u8 = 40;

/// Intensity of an unrotated receipt page at integer page coordinates:
/// light paper with rows of small hollow glyphs drawn in 2 px strokes.
///
/// Glyph columns are staggered from row to row so the page has no long
/// vertical runs of ink.
pub fn receipt_pixel(width: u32, height: u32, u: u32, v: u32) -> u8 {
    let paper = PAPER - (u * 20 / width.max(1)) as u8;
    let margin = 60;
    if u < margin || v < 80 || v + 60 > height {
        return paper;
    }

    let row = (v - 80) / 30;
    let dy = (v - 80) % 30;
    let shift = (row * 5) % 12;
    let line_end = width - margin - (row * 37) % 200;
    if dy >= 12 || u < margin + shift || u >= line_end {
        return paper;
    }

    let dx = (u - margin - shift) % 12;
    let stroke = dx < 8 && (dx < 2 || dx >= 6 || dy < 2 || dy >= 10);
    if stroke { INK } else { paper }
}

/// Seeded dark texture standing in for a table top.
pub fn noise_canvas(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_, _| {
        let n: u8 = rng.gen_range(45..=75);
        Rgb([n, n, n.saturating_add(10)])
    })
}

/// Nearly flat paper: every pixel is 100 or 101 at random.
pub fn paper_grain(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([if rng.gen_bool(0.5) { 101 } else { 100 }]))
}

/// A sheet filling the whole frame, ruled with long dark bars and rotated by
/// `angle_deg`. There is no page border to find.
pub fn ruled_sheet(size: u32, angle_deg: f64) -> DynamicImage {
    let (lo, hi) = (size / 6, size - size / 6);
    let sheet = GrayImage::from_fn(size, size, |x, y| {
        let bar = (lo..hi).contains(&x) && (lo..hi).contains(&y) && (y - lo) % 60 < 8;
        Luma([if bar { INK } else { PAPER }])
    });
    rotate(&DynamicImage::ImageLuma8(sheet), angle_deg)
}

fn paper_rgb(value: u8) -> Rgb<u8> {
    Rgb([value, value, value.saturating_sub(5)])
}

/// A `page_w x page_h` receipt rotated by `angle_deg` about `center`, pasted
/// onto a noise canvas. Also returns the four page corners in canvas
/// coordinates.
pub fn rotated_receipt(
    canvas: (u32, u32),
    page: (u32, u32),
    center: (f64, f64),
    angle_deg: f64,
    seed: u64,
) -> (DynamicImage, [Point2D; 4]) {
    let (page_w, page_h) = page;
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (hw, hh) = (page_w as f64 / 2.0, page_h as f64 / 2.0);

    let mut img = noise_canvas(canvas.0, canvas.1, seed);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (dx, dy) = (x as f64 - center.0, y as f64 - center.1);
        let u = cos * dx + sin * dy + hw;
        let v = -sin * dx + cos * dy + hh;
        if u >= 0.0 && v >= 0.0 && u < page_w as f64 && v < page_h as f64 {
            *px = paper_rgb(receipt_pixel(page_w, page_h, u as u32, v as u32));
        }
    }

    let corner = |u: f64, v: f64| {
        let (du, dv) = (u - hw, v - hh);
        Point2D::new(center.0 + cos * du - sin * dv, center.1 + sin * du + cos * dv)
    };
    let corners = [
        corner(0.0, 0.0),
        corner(page_w as f64, 0.0),
        corner(page_w as f64, page_h as f64),
        corner(0.0, page_h as f64),
    ];
    (DynamicImage::ImageRgb8(img), corners)
}

/// A `page_w x page_h` receipt projected onto `corners` (TL, TR, BR, BL) of a
/// noise canvas.
pub fn projected_receipt(
    canvas: (u32, u32),
    page: (u32, u32),
    corners: [Point2D; 4],
    seed: u64,
) -> DynamicImage {
    let (page_w, page_h) = page;
    let page_corners = [
        Point2D::new(0.0, 0.0),
        Point2D::new(page_w as f64, 0.0),
        Point2D::new(page_w as f64, page_h as f64),
        Point2D::new(0.0, page_h as f64),
    ];
    let to_page = Homography::from_correspondences(&corners, &page_corners)
        .expect("fixture corners are in general position");

    let mut img = noise_canvas(canvas.0, canvas.1, seed);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let Some(p) = to_page.apply(Point2D::new(x as f64, y as f64)) else {
            continue;
        };
        if p.x >= 0.0 && p.y >= 0.0 && p.x < page_w as f64 && p.y < page_h as f64 {
            *px = paper_rgb(receipt_pixel(page_w, page_h, p.x as u32, p.y as u32));
        }
    }
    DynamicImage::ImageRgb8(img)
}

/// Standard deviation of intensity in the `size x size` window centred on
/// `(cx, cy)`.
pub fn window_std_dev(gray: &GrayImage, cx: u32, cy: u32, size: u32) -> f64 {
    let half = size / 2;
    let values: Vec<f64> = (cy - half..cy + half)
        .flat_map(|y| (cx - half..cx + half).map(move |x| (x, y)))
        .map(|(x, y)| gray.get_pixel(x, y).0[0] as f64)
        .collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
