// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration.
//
// Resolution order: built-in defaults, then an optional JSON file, then
// environment variables, then whatever the caller (usually the CLI) sets.
// The pipeline takes its own copy at construction and never re-reads it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScanlayerError};

pub const ENV_CONFIDENCE_THRESHOLD: &str = "OCR_CONFIDENCE_THRESHOLD";
pub const ENV_LANG: &str = "OCR_LANG";
pub const ENV_DPI: &str = "OCR_DPI";
pub const ENV_TESSERACT_CMD: &str = "TESSERACT_CMD";
pub const ENV_TESSERACT_PATH: &str = "TESSERACT_PATH";
pub const ENV_FONT: &str = "OCR_FONT";
pub const ENV_JPN_FONT: &str = "OCR_JPN_FONT";
pub const ENV_FONT_DIR: &str = "OCR_FONT_DIR";
pub const ENV_JPN_FONT_DIR: &str = "OCR_JPN_FONT_DIR";

/// How the preprocessor reduces a page to two levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum BinarizationMode {
    /// Autocontrast, then pixels above `level` become white.
    Fixed { level: u8 },
    /// Global threshold from Otsu's method.
    Otsu,
    /// Local mean over a square window (integral image).
    Adaptive { window: u32, bias: i16 },
}

impl Default for BinarizationMode {
    fn default() -> Self {
        Self::Fixed { level: 180 }
    }
}

/// What the pipeline does when a single page fails to render or recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageErrorPolicy {
    /// Record the error and emit the page without a text layer.
    #[default]
    Skip,
    /// Stop the run at the first failed page.
    Abort,
}

/// Settings for one convert or extract run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanlayerConfig {
    /// Tesseract language code (single language).
    pub language: String,
    /// Rasterization resolution.
    pub dpi: u32,
    /// Pages whose first-pass confidence is strictly below this are enhanced.
    pub confidence_threshold: f64,
    /// Words below this confidence are left out of the text layer.
    pub render_min_confidence: f64,
    pub upscale_factor: f64,
    pub binarization: BinarizationMode,
    /// Explicit engine location; searched for when absent.
    pub tesseract_cmd: Option<PathBuf>,
    /// Tesseract page segmentation mode.
    pub tesseract_psm: u8,
    /// Explicit font file for the text layer.
    pub font_path: Option<PathBuf>,
    /// Extra directories searched for fonts, before the platform defaults.
    pub font_dirs: Vec<PathBuf>,
    /// Header written before each page in text output. `{page}` is 1-based.
    pub page_separator: String,
    /// Pages processed concurrently. 1 means strictly sequential.
    pub workers: usize,
    pub page_error_policy: PageErrorPolicy,
}

impl Default for ScanlayerConfig {
    fn default() -> Self {
        Self {
            language: "jpn".into(),
            dpi: 300,
            confidence_threshold: 65.0,
            render_min_confidence: 50.0,
            upscale_factor: 1.5,
            binarization: BinarizationMode::default(),
            tesseract_cmd: None,
            tesseract_psm: 6,
            font_path: None,
            font_dirs: Vec::new(),
            page_separator: "--- Page {page} ---".into(),
            workers: 1,
            page_error_policy: PageErrorPolicy::Skip,
        }
    }
}

impl ScanlayerConfig {
    /// Defaults, overlaid by `path` (if given) and then by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ScanlayerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| ScanlayerError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Taking a lookup function keeps tests independent of the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_CONFIDENCE_THRESHOLD) {
            self.confidence_threshold = raw.trim().parse().map_err(|_| {
                ScanlayerError::Config(format!("{ENV_CONFIDENCE_THRESHOLD}={raw} is not a number"))
            })?;
        }
        if let Some(lang) = get(ENV_LANG) {
            self.language = lang.trim().to_string();
        }
        if let Some(raw) = get(ENV_DPI) {
            self.dpi = raw.trim().parse().map_err(|_| {
                ScanlayerError::Config(format!("{ENV_DPI}={raw} is not a positive integer"))
            })?;
        }
        if self.tesseract_cmd.is_none() {
            self.tesseract_cmd = get(ENV_TESSERACT_CMD)
                .or_else(|| get(ENV_TESSERACT_PATH))
                .map(PathBuf::from);
        }
        if self.font_path.is_none() {
            self.font_path = get(ENV_FONT).or_else(|| get(ENV_JPN_FONT)).map(PathBuf::from);
        }
        for key in [ENV_FONT_DIR, ENV_JPN_FONT_DIR] {
            if let Some(dir) = get(key) {
                let dir = PathBuf::from(dir);
                if !self.font_dirs.contains(&dir) {
                    self.font_dirs.push(dir);
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(ScanlayerError::Config(format!(
                "confidence threshold {} must be between 0 and 100",
                self.confidence_threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.render_min_confidence) {
            return Err(ScanlayerError::Config(format!(
                "render confidence floor {} must be between 0 and 100",
                self.render_min_confidence
            )));
        }
        if !self.upscale_factor.is_finite() || self.upscale_factor < 1.0 {
            return Err(ScanlayerError::Config(format!(
                "upscale factor {} must be at least 1.0",
                self.upscale_factor
            )));
        }
        if self.dpi == 0 {
            return Err(ScanlayerError::Config("DPI must be greater than zero".into()));
        }
        if self.workers == 0 {
            return Err(ScanlayerError::Config("workers must be at least 1".into()));
        }
        if self.language.trim().is_empty() {
            return Err(ScanlayerError::Config("OCR language is empty".into()));
        }
        if let BinarizationMode::Adaptive { window, .. } = self.binarization {
            if window == 0 {
                return Err(ScanlayerError::Config(
                    "adaptive binarization window must be greater than zero".into(),
                ));
            }
        }
        Ok(())
    }

    /// Page header for text output, `page_index` 0-based.
    pub fn page_header(&self, page_index: usize) -> String {
        self.page_separator
            .replace("{page}", &(page_index + 1).to_string())
    }
}
