// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document: Receipt and document image rectification.
//
// Finds the paper in a photograph, flattens its perspective, and turns it
// into a crisp, level, OCR-ready page. `ScanPipeline` drives the stages in
// `scan`; `image` holds boundary I/O.

pub mod image;
pub mod pipeline;
pub mod scan;

// Re-export the primary structs so callers can use `scanwerk_document::ScanPipeline` etc.
pub use pipeline::{DetectionReport, ScanPipeline};
pub use scan::{
    ContourExtractor, EdgeDetector, ImageEnhancer, PerspectiveRectifier, ShadowRemover,
    SkewCorrector,
};

#[cfg(feature = "ocr")]
pub use scan::{OcrConfig, OcrEngine};
