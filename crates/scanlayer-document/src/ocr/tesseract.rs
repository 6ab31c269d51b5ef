// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract CLI adapter.
//
// Each call writes the bitmap to a scratch PNG, runs
// `tesseract <png> stdout -l <lang> --psm <n> --dpi <dpi> tsv`, and parses
// word rows from stdout. The engine location is resolved once, when the
// adapter is built.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::DynamicImage;
use scanlayer_core::config::ScanlayerConfig;
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::OcrWord;
use tracing::{debug, info, instrument};

use super::engine::Recognizer;
use super::locate::locate_tesseract;
use super::tsv::parse_words;
use crate::image::processor::ImageProcessor;

/// Recognizer backed by an installed `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
    language: String,
    psm: u8,
}

impl TesseractEngine {
    /// Use `command` as-is, without probing it.
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>, psm: u8) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            psm,
        }
    }

    /// Locate the engine per `config` and fail fast with
    /// `EngineNotFound` if none runs.
    #[instrument(skip(config), fields(language = %config.language))]
    pub fn from_config(config: &ScanlayerConfig) -> Result<Self> {
        let command = locate_tesseract(config.tesseract_cmd.as_deref())?;
        let engine = Self::new(command, config.language.clone(), config.tesseract_psm);
        info!(engine = %engine.command.display(), "Tesseract ready");
        Ok(engine)
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// First line of `tesseract --version`.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ScanlayerError::EngineNotFound(format!("{}: {e}", self.command.display())))?;
        // Older releases print the banner on stderr.
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn run_tsv(&self, png: &Path, page: usize, dpi: u32) -> Result<String> {
        let output = Command::new(&self.command)
            .arg(png)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("--dpi")
            .arg(dpi.to_string())
            .arg("tsv")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ScanlayerError::Recognition {
                page,
                message: format!("failed to run {}: {e}", self.command.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanlayerError::Recognition {
                page,
                message: format!("tesseract exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Recognizer for TesseractEngine {
    #[instrument(skip(self, image), fields(page, dpi, width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage, page: usize, dpi: u32) -> Result<Vec<OcrWord>> {
        let scratch = tempfile::Builder::new()
            .prefix("scanlayer-page-")
            .suffix(".png")
            .tempfile()?;
        ImageProcessor::from_dynamic(image.clone()).save_png(scratch.path())?;

        let tsv = self.run_tsv(scratch.path(), page, dpi)?;
        let words = parse_words(&tsv);
        debug!(words = words.len(), "Tesseract pass complete");
        Ok(words)
    }

    fn language(&self) -> &str {
        &self.language
    }
}
