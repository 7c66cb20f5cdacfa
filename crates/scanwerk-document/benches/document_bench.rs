// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the scan pipeline: document detection alone, and
// the full scan (detect, rectify, enhance) on a synthetic photograph.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use scanwerk_core::PipelineConfig;
use scanwerk_document::ScanPipeline;
use scanwerk_document::scan::denoise::non_local_means;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A light 480x640 page with ruled text lines on a dark 640x800 background.
fn synthetic_photo() -> DynamicImage {
    let mut img = GrayImage::from_pixel(640, 800, Luma([50u8]));
    for y in 80..720 {
        for x in 80..560 {
            let ink = (y - 80) % 24 < 3 && (100..540).contains(&x);
            img.put_pixel(x, y, Luma([if ink { 40 } else { 230 }]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_detect(c: &mut Criterion) {
    let pipeline = ScanPipeline::new(PipelineConfig::default()).unwrap();
    let photo = synthetic_photo();
    c.bench_function("detect (640x800)", |b| {
        b.iter(|| black_box(pipeline.detect(black_box(&photo))));
    });
}

fn bench_scan_document(c: &mut Criterion) {
    let pipeline = ScanPipeline::new(PipelineConfig::default()).unwrap();
    let photo = synthetic_photo();
    let mut group = c.benchmark_group("scan");
    group.sample_size(10);
    group.bench_function("scan_document (640x800)", |b| {
        b.iter(|| black_box(pipeline.scan_document(black_box(&photo))));
    });
    group.finish();
}

/// Non-local means dominates the enhancement cost.
fn bench_denoise(c: &mut Criterion) {
    let page = synthetic_photo().to_luma8();
    let mut group = c.benchmark_group("denoise");
    group.sample_size(10);
    group.bench_function("non_local_means 7/21 (640x800)", |b| {
        b.iter(|| black_box(non_local_means(black_box(&page), 7, 21, 10.0)));
    });
    group.finish();
}

criterion_group!(benches, bench_detect, bench_scan_document, bench_denoise);
criterion_main!(benches);
