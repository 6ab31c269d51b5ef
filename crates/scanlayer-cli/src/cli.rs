// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scanlayer_core::config::{PageErrorPolicy, ScanlayerConfig};

/// Make image-only PDFs searchable, extract their text, or remove their password.
#[derive(Debug, Parser)]
#[command(name = "scanlayer", about, version)]
pub struct Cli {
    /// Log debug detail (overridden by RUST_LOG)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add an invisible text layer to every page of an image-only PDF
    Convert {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        ocr: OcrArgs,
    },

    /// Recognize the text of an image-only PDF into a plain-text file
    Extract {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Header written before each page; `{page}` is the 1-based page number
        #[arg(long, value_name = "TEMPLATE")]
        separator: Option<String>,

        #[command(flatten)]
        ocr: OcrArgs,
    },

    /// Write a copy of a password-protected PDF without its encryption
    Unlock {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Password that opens the document
        #[arg(long)]
        password: String,
    },
}

/// Options shared by `convert` and `extract`.
#[derive(Debug, Args)]
pub struct OcrArgs {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tesseract language code (e.g. jpn, eng)
    #[arg(long)]
    pub lang: Option<String>,

    /// Rasterization resolution
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Pages below this average confidence get an enhanced second pass (0-100)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Pages processed at once
    #[arg(long)]
    pub workers: Option<usize>,

    /// What to do when a page cannot be rendered or recognized
    #[arg(long, value_enum)]
    pub on_page_error: Option<PagePolicyArg>,

    /// Path to the tesseract executable
    #[arg(long, value_name = "PATH")]
    pub tesseract: Option<PathBuf>,

    /// Font file for the text layer
    #[arg(long, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// Password for an encrypted input
    #[arg(long)]
    pub password: Option<String>,

    /// Write a JSON run report here
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PagePolicyArg {
    /// Keep going; the page is emitted without text
    Skip,
    /// Stop the run at the first failing page
    Abort,
}

impl From<PagePolicyArg> for PageErrorPolicy {
    fn from(arg: PagePolicyArg) -> Self {
        match arg {
            PagePolicyArg::Skip => PageErrorPolicy::Skip,
            PagePolicyArg::Abort => PageErrorPolicy::Abort,
        }
    }
}

impl OcrArgs {
    /// Flags take precedence over the file and the environment.
    pub fn apply(&self, config: &mut ScanlayerConfig) {
        if let Some(lang) = &self.lang {
            config.language = lang.clone();
        }
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if let Some(threshold) = self.threshold {
            config.confidence_threshold = threshold;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(policy) = self.on_page_error {
            config.page_error_policy = policy.into();
        }
        if let Some(tesseract) = &self.tesseract {
            config.tesseract_cmd = Some(tesseract.clone());
        }
        if let Some(font) = &self.font {
            config.font_path = Some(font.clone());
        }
    }
}
