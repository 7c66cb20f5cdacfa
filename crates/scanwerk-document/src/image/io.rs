// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image I/O at the pipeline boundary: decoding sources, encoding artifacts,
// and writing them so that a failed write never leaves a partial file behind.

use std::path::Path;

use image::{DynamicImage, ImageFormat};
use scanwerk_core::error::ScanwerkError;
use tracing::{debug, info, instrument, warn};

/// Load and decode an image from a file path (JPEG, PNG, BMP, TIFF, ...).
///
/// A missing file, an unreadable file, and undecodable content all map to
/// [`ScanwerkError::Decode`].
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, ScanwerkError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| {
        ScanwerkError::Decode(format!("failed to read {}: {}", path.display(), err))
    })?;
    let img = decode_image(&bytes).map_err(|err| match err {
        ScanwerkError::Decode(msg) => {
            ScanwerkError::Decode(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;
    info!(width = img.width(), height = img.height(), "Image loaded");
    Ok(img)
}

/// Decode an image from raw encoded bytes, guessing the format from content.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, ScanwerkError> {
    let img = image::load_from_memory(data)
        .map_err(|err| ScanwerkError::Decode(format!("failed to decode image: {}", err)))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ScanwerkError::Decode("image has zero area".into()));
    }
    debug!(
        width = img.width(),
        height = img.height(),
        "Image decoded from bytes"
    );
    Ok(img)
}

/// Encode an image into the given format, returning the raw bytes.
pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ScanwerkError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    let result = match format {
        // JPEG has no alpha and no 16-bit support.
        ImageFormat::Jpeg => match image {
            DynamicImage::ImageLuma8(_) => image.write_to(&mut cursor, format),
            _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut cursor, format),
        },
        _ => image.write_to(&mut cursor, format),
    };
    result.map_err(|err| ScanwerkError::Encode(format!("{:?} encoding failed: {}", format, err)))?;
    Ok(buffer)
}

/// Output format for a destination path, inferred from its extension.
/// Unknown or missing extensions fall back to PNG.
pub fn format_for_path(path: &Path) -> ImageFormat {
    ImageFormat::from_path(path).unwrap_or(ImageFormat::Png)
}

/// Encode `image` for `path` and write it as a single file.
///
/// Encoding happens fully in memory first. If the write itself fails the
/// partially written file is removed.
#[instrument(skip(image), fields(path = %path.as_ref().display()))]
pub fn save_image(image: &DynamicImage, path: impl AsRef<Path>) -> Result<(), ScanwerkError> {
    let path = path.as_ref();
    let bytes = encode_image(image, format_for_path(path))?;
    if let Err(err) = std::fs::write(path, &bytes) {
        if path.exists() {
            if let Err(cleanup) = std::fs::remove_file(path) {
                warn!(error = %cleanup, "Could not remove partially written artifact");
            }
        }
        return Err(err.into());
    }
    debug!(bytes = bytes.len(), "Artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ScanwerkError::Decode(_)));
    }

    #[test]
    fn missing_file_is_decode_error() {
        let err = load_image("/nonexistent/receipt.jpg").unwrap_err();
        assert!(matches!(err, ScanwerkError::Decode(_)));
    }

    #[test]
    fn png_encode_decode_preserves_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(37, 21, Luma([90u8])));
        let bytes = encode_image(&img, ImageFormat::Png).unwrap();
        let back = decode_image(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (37, 21));
    }

    #[test]
    fn unknown_extension_falls_back_to_png() {
        assert_eq!(format_for_path(Path::new("out.scan")), ImageFormat::Png);
        assert_eq!(format_for_path(Path::new("out.jpg")), ImageFormat::Jpeg);
        assert_eq!(format_for_path(Path::new("out.tiff")), ImageFormat::Tiff);
    }

    #[test]
    fn save_to_missing_directory_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no-such-dir").join("out.png");
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([0u8])));
        assert!(save_image(&img, &target).is_err());
        assert!(!target.exists());
    }
}
