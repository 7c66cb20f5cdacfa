// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text recognition collaborator backed by the pure-Rust `ocrs` engine.
//
// Only compiled with the `ocr` feature. The engine needs two `.rten` model
// files (text detection and text recognition), looked up by default in
// `$XDG_CACHE_HOME/ocrs`, then `~/.cache/ocrs`. Running `ocrs-cli` once
// downloads them there.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams, OcrInput};
use rten::Model;
use scanwerk_core::{Result, ScanwerkError, TextRecognizer};
use tracing::{debug, info, instrument};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where the two OCR models live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expect `text-detection.rten` and `text-recognition.rten` inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Both model files are present on disk.
    pub fn models_available(&self) -> bool {
        self.detection_model_path.exists() && self.recognition_model_path.exists()
    }

    fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(ScanwerkError::Ocr(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Loaded OCR models. Construction is the expensive step, so build one engine
/// and reuse it for every artifact.
pub struct OcrEngine {
    engine: OcrsEngine,
}

impl OcrEngine {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self> {
        config.validate()?;

        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                ScanwerkError::Ocr(format!("failed to load model {}: {}", path.display(), err))
            })
        };
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| ScanwerkError::Ocr(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }

    /// Load models from the default cache directory.
    pub fn with_defaults() -> Result<Self> {
        Self::new(&OcrConfig::default())
    }

    fn prepare(&self, image: &DynamicImage) -> Result<OcrInput> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ScanwerkError::Ocr(format!("bad image source ({width}x{height}): {err}"))
        })?;
        self.engine
            .prepare_input(source)
            .map_err(|err| ScanwerkError::Ocr(format!("OCR preprocessing failed: {err}")))
    }

    /// Recognised text, one output line per detected text line, with blank
    /// lines dropped.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn lines(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let input = self.prepare(image)?;
        let words = self
            .engine
            .detect_words(&input)
            .map_err(|err| ScanwerkError::Ocr(format!("word detection failed: {err}")))?;
        let rects = self.engine.find_text_lines(&input, &words);
        let recognised = self
            .engine
            .recognize_text(&input, &rects)
            .map_err(|err| ScanwerkError::Ocr(format!("line recognition failed: {err}")))?;

        let lines = non_blank_lines(recognised.iter().flatten().map(|line| line.to_string()));
        debug!(words = words.len(), lines = lines.len(), "Text lines recognised");
        Ok(lines)
    }
}

/// Receipt lines in reading order with surrounding whitespace trimmed; lines
/// holding nothing but whitespace are dropped.
fn non_blank_lines(lines: impl IntoIterator<Item = String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

impl TextRecognizer for OcrEngine {
    /// The artifact's text lines joined with newlines.
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        Ok(self.lines(image)?.join("\n"))
    }
}
