// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: receipt photo rectification from the command line.
//
// Entry point. Initialises logging, loads the pipeline configuration, and
// dispatches to the `scan`, `process`, `detect`, and `config` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use scanwerk_core::PipelineConfig;
use scanwerk_document::ScanPipeline;
use scanwerk_document::image::load_image;

#[derive(Parser)]
#[command(name = "scanwerk")]
#[command(about = "Flatten, clean up, and deskew photographed receipts", version)]
struct Cli {
    /// JSON file overriding pipeline defaults (missing fields keep defaults)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one photo and write the cleaned artifact
    Scan {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Output image; format follows the extension (PNG if unknown)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
        /// Skip the shadow-removal pre-pass
        #[arg(long)]
        no_shadows: bool,
        /// Skip the skew-correction post-pass
        #[arg(long)]
        no_deskew: bool,
        /// Print recognised text after scanning
        #[cfg(feature = "ocr")]
        #[arg(long)]
        ocr: bool,
    },
    /// Process several photos in parallel into a directory
    Process {
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
        #[arg(value_name = "INPUTS", required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Report document detection diagnostics as JSON
    Detect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Print the effective pipeline configuration as JSON
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scan {
            input,
            output,
            no_shadows,
            no_deskew,
            #[cfg(feature = "ocr")]
            ocr,
        } => {
            config.remove_shadows &= !no_shadows;
            config.correct_skew &= !no_deskew;
            let pipeline = ScanPipeline::new(config)?;
            let outcome = pipeline
                .try_process_receipt(&input, &output)
                .with_context(|| format!("failed to process {}", input.display()))?;
            println!(
                "{} -> {} ({}x{}{})",
                input.display(),
                output.display(),
                outcome.width(),
                outcome.height(),
                if outcome.fallback_used { ", no document edges found" } else { "" }
            );

            #[cfg(feature = "ocr")]
            {
                if ocr {
                    let engine = scanwerk_document::OcrEngine::with_defaults()?;
                    println!("{}", pipeline.recognize_text(&outcome, &engine)?);
                }
            }
        }
        Command::Process { out_dir, inputs } => {
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("cannot create {}", out_dir.display()))?;
            let pipeline = ScanPipeline::new(config)?;
            let failed = process_all(&pipeline, &out_dir, &inputs);
            tracing::info!(total = inputs.len(), failed, "Batch finished");
            if failed > 0 {
                bail!("{failed} of {} inputs could not be processed", inputs.len());
            }
        }
        Command::Detect { input } => {
            let pipeline = ScanPipeline::new(config)?;
            let image = load_image(&input)?;
            let report = pipeline.detect(&image);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config => {
            config.validate()?;
            println!("{}", config.to_json()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("invalid config file {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Artifact path for `input` inside `out_dir`: `<stem>-scan.png`.
fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{stem}-scan.png"))
}

/// Process `inputs` on scoped worker threads sharing one pipeline. Returns
/// the number of failures.
fn process_all(pipeline: &ScanPipeline, out_dir: &Path, inputs: &[PathBuf]) -> usize {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(inputs.len())
        .max(1);
    let chunk = inputs.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .chunks(chunk.max(1))
            .map(|batch| {
                scope.spawn(move || {
                    batch
                        .iter()
                        .filter(|input| {
                            let output = output_path(out_dir, input);
                            let ok = pipeline.process_receipt(input, &output);
                            if ok {
                                println!("{} -> {}", input.display(), output.display());
                            }
                            !ok
                        })
                        .count()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(1))
            .sum()
    })
}
