// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration: every tunable of the scan pipeline in one
// immutable value.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// How the adaptive threshold weights the local neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Gaussian-weighted local mean.
    Gaussian,
    /// Unweighted box mean (summed-area table).
    Mean,
}

/// Tunables for the scan pipeline.
///
/// Read-only once the pipeline is built. Any field missing from a JSON
/// override falls back to its default.
///
/// `processing_height` and `min_contour_area` are coupled: the area floor is
/// measured on the resized working copy, so lowering the working height
/// raises the smallest document that can be detected at native resolution.
/// See [`PipelineConfig::native_area_floor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // -- Working resolution --
    /// Height (px) of the working copy used for document detection.
    pub processing_height: u32,

    // -- Edge detection --
    /// Gaussian smoothing kernel size (odd).
    pub blur_kernel_size: u32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,

    // -- Contour selection --
    /// Number of largest contours examined for a quadrilateral.
    pub max_candidates: usize,
    /// Polygon simplification tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Minimum enclosed area (px², working resolution) of an accepted document.
    pub min_contour_area: f64,

    // -- Enhancement --
    /// Adaptive threshold window size (odd).
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean.
    pub threshold_offset: f32,
    pub threshold_method: ThresholdMethod,
    /// Non-local-means patch size (odd).
    pub denoise_template_window: u32,
    /// Non-local-means search window (odd).
    pub denoise_search_window: u32,
    /// Non-local-means filter strength `h`.
    pub denoise_strength: f32,
    /// Centre weight of the 3x3 sharpening kernel; the eight neighbours are -1.
    pub sharpen_center_weight: f32,

    // -- Skew correction --
    pub skew_canny_low: f32,
    pub skew_canny_high: f32,
    /// Minimum Hough accumulator votes for a line to count.
    pub skew_vote_threshold: u32,
    /// Hough non-maximum suppression radius.
    pub skew_suppression_radius: u32,

    // -- Shadow removal --
    /// CLAHE clip limit.
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per axis (grid is N x N).
    pub clahe_tile_grid: u32,

    // -- Receipt post/pre passes --
    pub remove_shadows: bool,
    pub correct_skew: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing_height: 500,
            blur_kernel_size: 5,
            canny_low: 75.0,
            canny_high: 200.0,
            max_candidates: 5,
            approx_epsilon_ratio: 0.02,
            min_contour_area: 10_000.0,
            threshold_block_size: 11,
            threshold_offset: 2.0,
            threshold_method: ThresholdMethod::Gaussian,
            denoise_template_window: 7,
            denoise_search_window: 21,
            denoise_strength: 10.0,
            sharpen_center_weight: 9.0,
            skew_canny_low: 50.0,
            skew_canny_high: 150.0,
            skew_vote_threshold: 200,
            skew_suppression_radius: 4,
            clahe_clip_limit: 3.0,
            clahe_tile_grid: 8,
            remove_shadows: true,
            correct_skew: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON override. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON override from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serialise to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the stages cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.processing_height == 0 {
            return Err(invalid("processing_height must be at least 1"));
        }
        check_odd("blur_kernel_size", self.blur_kernel_size)?;
        check_odd("threshold_block_size", self.threshold_block_size)?;
        check_odd("denoise_template_window", self.denoise_template_window)?;
        check_odd("denoise_search_window", self.denoise_search_window)?;
        if self.canny_low > self.canny_high {
            return Err(invalid("canny_low must not exceed canny_high"));
        }
        if self.skew_canny_low > self.skew_canny_high {
            return Err(invalid("skew_canny_low must not exceed skew_canny_high"));
        }
        if self.max_candidates == 0 {
            return Err(invalid("max_candidates must be at least 1"));
        }
        if !(self.approx_epsilon_ratio > 0.0) {
            return Err(invalid("approx_epsilon_ratio must be positive"));
        }
        if !(self.min_contour_area >= 0.0) {
            return Err(invalid("min_contour_area must not be negative"));
        }
        if !(self.denoise_strength > 0.0) {
            return Err(invalid("denoise_strength must be positive"));
        }
        if !(self.clahe_clip_limit > 0.0) {
            return Err(invalid("clahe_clip_limit must be positive"));
        }
        if self.clahe_tile_grid == 0 {
            return Err(invalid("clahe_tile_grid must be at least 1"));
        }
        Ok(())
    }

    /// Scale factor between an image of `original_height` and the working copy.
    ///
    /// Below 1 for images shorter than the working height, which are upscaled.
    pub fn working_ratio(&self, original_height: u32) -> f64 {
        original_height as f64 / self.processing_height as f64
    }

    /// Smallest document area (px², native resolution) that can pass the
    /// contour area floor for an image of `original_height`.
    pub fn native_area_floor(&self, original_height: u32) -> f64 {
        let ratio = self.working_ratio(original_height);
        self.min_contour_area * ratio * ratio
    }

    /// Gaussian sigma equivalent to the configured blur kernel size.
    pub fn blur_sigma(&self) -> f32 {
        kernel_sigma(self.blur_kernel_size)
    }
}

/// Sigma of a Gaussian kernel of odd size `k`, matching the convention used
/// by common vision libraries when only the size is given.
pub fn kernel_sigma(k: u32) -> f32 {
    0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn check_odd(name: &str, value: u32) -> Result<()> {
    if value == 0 || value % 2 == 0 {
        return Err(invalid(&format!("{name} must be odd, got {value}")));
    }
    Ok(())
}

fn invalid(msg: &str) -> ScanwerkError {
    ScanwerkError::InvalidConfig(msg.to_string())
}
