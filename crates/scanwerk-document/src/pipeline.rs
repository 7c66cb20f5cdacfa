// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan pipeline orchestration: resize-for-speed detection, coordinate
// rescaling, rectification at native resolution, and the fallback policy that
// keeps every decodable input producing an artifact.

use std::borrow::Cow;
use std::path::Path;

use image::DynamicImage;
use scanwerk_core::{
    DetectionResult, PipelineConfig, Quadrilateral, Result, ScanOutcome, TextRecognizer,
};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::image::io::{decode_image, load_image, save_image};
use crate::image::sampling::resize_to_height;
use crate::scan::contours::extract_contours;
use crate::scan::{
    ContourExtractor, EdgeDetector, ImageEnhancer, PerspectiveRectifier, ShadowRemover,
    SkewCorrector,
};

/// What document detection saw on the working copy of an image.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub width: u32,
    pub height: u32,
    pub working_width: u32,
    pub working_height: u32,
    /// Native height divided by working height.
    pub ratio: f64,
    /// Outer contours found on the working edge map.
    pub contour_count: usize,
    /// Document corners in native-resolution coordinates.
    pub quadrilateral: Option<Quadrilateral>,
}

/// The full receipt pipeline, built once from a validated [`PipelineConfig`]
/// and shared by reference across threads.
#[derive(Debug, Clone)]
pub struct ScanPipeline {
    config: PipelineConfig,
    edges: EdgeDetector,
    contours: ContourExtractor,
    rectifier: PerspectiveRectifier,
    enhancer: ImageEnhancer,
    skew: SkewCorrector,
    shadows: ShadowRemover,
}

impl ScanPipeline {
    /// Validate `config` and build every stage from it.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            edges: EdgeDetector::new(&config),
            contours: ContourExtractor::new(&config),
            rectifier: PerspectiveRectifier::new(),
            enhancer: ImageEnhancer::new(&config),
            skew: SkewCorrector::new(&config),
            shadows: ShadowRemover::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Look for the document boundary on a working copy resized (up or down)
    /// to the processing height, reporting corners at native resolution.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> DetectionReport {
        let ratio = self.config.working_ratio(image.height());
        let working = resize_to_height(image, self.config.processing_height);
        let edges = self.edges.detect(&working);
        let traced = extract_contours(&edges);
        let contour_count = traced.len();

        let quadrilateral = match self.contours.select_document(traced) {
            DetectionResult::Found(quad) => {
                let native = quad.scaled(ratio);
                debug!(
                    ratio,
                    corners = ?native.corners(),
                    "Quadrilateral mapped to native resolution"
                );
                Some(native)
            }
            DetectionResult::NotFound => None,
        };

        DetectionReport {
            width: image.width(),
            height: image.height(),
            working_width: working.width(),
            working_height: working.height(),
            ratio,
            contour_count,
            quadrilateral,
        }
    }

    /// Detect, rectify, and enhance a single image. Never fails: when no
    /// document is found, or rectification is geometrically impossible, the
    /// unrectified image is enhanced instead and `fallback_used` is set.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn scan_document(&self, image: &DynamicImage) -> ScanOutcome {
        let quadrilateral = self.detect(image).quadrilateral;

        let rectified = quadrilateral.as_ref().and_then(|quad| {
            match self.rectifier.rectify(image, quad) {
                Ok(flat) => Some(flat),
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "Rectification failed; falling back to the original");
                    None
                }
                Err(err) => {
                    error!(
                        error = %err,
                        "Unexpected rectification error; falling back to the original"
                    );
                    None
                }
            }
        });
        let fallback_used = rectified.is_none();
        if quadrilateral.is_none() {
            warn!("No document boundary detected; enhancing the original");
        }

        let enhanced = self.enhancer.enhance(rectified.as_ref().unwrap_or(image));
        info!(
            width = enhanced.width(),
            height = enhanced.height(),
            fallback_used,
            "Scan complete"
        );

        ScanOutcome {
            image: enhanced,
            fallback_used,
            quadrilateral,
            skew_angle_deg: None,
        }
    }

    /// In-memory receipt processing: shadow removal, `scan_document`, then
    /// skew correction. The pre- and post-pass run regardless of whether a
    /// document was detected, each behind its config toggle.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn process_image(&self, image: &DynamicImage) -> ScanOutcome {
        let prepared: Cow<'_, DynamicImage> = if self.config.remove_shadows {
            Cow::Owned(self.shadows.remove(image))
        } else {
            Cow::Borrowed(image)
        };

        let mut outcome = self.scan_document(&prepared);

        if self.config.correct_skew {
            let (levelled, angle) = self.skew.correct(&outcome.image);
            outcome.image = levelled;
            outcome.skew_angle_deg = angle;
        }
        outcome
    }

    /// Decode `data` and run `scan_document` on it.
    pub fn scan_bytes(&self, data: &[u8]) -> Result<ScanOutcome> {
        let image = decode_image(data)?;
        Ok(self.scan_document(&image))
    }

    /// Load `src`, process it, and write the artifact to `dst` (format from
    /// the extension, PNG when unknown).
    ///
    /// Only decoding and the final write can fail; nothing is written when
    /// decoding fails.
    #[instrument(skip_all, fields(src = %src.as_ref().display(), dst = %dst.as_ref().display()))]
    pub fn try_process_receipt(
        &self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
    ) -> Result<ScanOutcome> {
        let image = load_image(src)?;
        let outcome = self.process_image(&image);
        save_image(&outcome.image, dst)?;
        info!(fallback_used = outcome.fallback_used, "Receipt processed");
        Ok(outcome)
    }

    /// Boolean form of [`ScanPipeline::try_process_receipt`]: `false` when the
    /// source cannot be decoded or the artifact cannot be written.
    pub fn process_receipt(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> bool {
        match self.try_process_receipt(src, dst) {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "Receipt processing failed");
                false
            }
        }
    }

    /// Hand the artifact to a text-recognition collaborator.
    pub fn recognize_text(
        &self,
        outcome: &ScanOutcome,
        recognizer: &dyn TextRecognizer,
    ) -> Result<String> {
        let text = recognizer.recognize(&outcome.image)?;
        debug!(chars = text.chars().count(), "Text recognized");
        Ok(text)
    }
}
