// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline stages: edge detection, contour extraction, perspective
// rectification, enhancement, skew correction, shadow removal, and optical
// character recognition (OCR).

pub mod contours;
pub mod denoise;
pub mod edges;
pub mod enhance;
pub mod rectify;
pub mod shadow;
pub mod skew;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use contours::ContourExtractor;
pub use edges::EdgeDetector;
pub use enhance::ImageEnhancer;
pub use rectify::{Homography, PerspectiveRectifier};
pub use shadow::ShadowRemover;
pub use skew::SkewCorrector;

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrEngine};
