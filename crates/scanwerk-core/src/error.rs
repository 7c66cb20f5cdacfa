// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
///
/// Only [`ScanwerkError::Decode`] is fatal for a pipeline invocation. A
/// [`ScanwerkError::Geometry`] raised while rectifying is caught by the
/// orchestrator, which falls back to the unrectified image.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Input / output --
    #[error("failed to decode source image: {0}")]
    Decode(String),

    #[error("failed to encode output image: {0}")]
    Encode(String),

    // -- Pipeline --
    #[error("degenerate geometry: {0}")]
    Geometry(String),

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    // -- Collaborators --
    #[error("text recognition failed: {0}")]
    Ocr(String),

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanwerkError {
    /// Whether the orchestrator may recover from this error by falling back
    /// to the unrectified image.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Geometry(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
