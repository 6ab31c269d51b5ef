// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanlayer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Scanlayer operations.
#[derive(Debug, Error)]
pub enum ScanlayerError {
    // -- Fatal setup errors (abort before any page is processed) --
    #[error("OCR engine not found: {0}")]
    EngineNotFound(String),

    #[error("no embeddable font found: {0}")]
    FontNotFound(String),

    // -- Per-page errors --
    #[error("page {} could not be rendered: {message}", .page + 1)]
    PageRender { page: usize, message: String },

    #[error("text recognition failed on page {}: {message}", .page + 1)]
    Recognition { page: usize, message: String },

    // -- Unlock errors --
    #[error("the password does not open this PDF")]
    InvalidPassword,

    #[error("nothing to unlock: {0}")]
    AlreadyUnlockedOrUnsupported(String),

    // -- Input / output validation --
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("input and output refer to the same file: {}", .0.display())]
    SamePath(PathBuf),

    // -- Codec errors --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("processing cancelled after {completed} of {total} pages")]
    Cancelled { completed: usize, total: usize },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanlayerError>;

/// Machine-checkable error kind, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    EngineNotFound,
    FontNotFound,
    PageRender,
    Recognition,
    InvalidPassword,
    AlreadyUnlockedOrUnsupported,
    InputNotFound,
    SamePath,
    Pdf,
    Image,
    Config,
    Io,
    Cancelled,
    Internal,
}

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Confined to one page; the run may continue.
    PerPage,
    /// Aborts the whole operation.
    Fatal,
}

impl ErrorKind {
    /// Name printed on stderr and written to run reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EngineNotFound => "EngineNotFoundError",
            Self::FontNotFound => "FontNotFoundError",
            Self::PageRender => "PageRenderError",
            Self::Recognition => "RecognitionError",
            Self::InvalidPassword => "InvalidPasswordError",
            Self::AlreadyUnlockedOrUnsupported => "AlreadyUnlockedOrUnsupportedError",
            Self::InputNotFound => "InputNotFoundError",
            Self::SamePath => "SamePathError",
            Self::Pdf => "PdfError",
            Self::Image => "ImageError",
            Self::Config => "ConfigError",
            Self::Io => "IoError",
            Self::Cancelled => "CancelledError",
            Self::Internal => "InternalError",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PageRender | Self::Recognition => ErrorClass::PerPage,
            _ => ErrorClass::Fatal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScanlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EngineNotFound(_) => ErrorKind::EngineNotFound,
            Self::FontNotFound(_) => ErrorKind::FontNotFound,
            Self::PageRender { .. } => ErrorKind::PageRender,
            Self::Recognition { .. } => ErrorKind::Recognition,
            Self::InvalidPassword => ErrorKind::InvalidPassword,
            Self::AlreadyUnlockedOrUnsupported(_) => ErrorKind::AlreadyUnlockedOrUnsupported,
            Self::InputNotFound(_) => ErrorKind::InputNotFound,
            Self::SamePath(_) => ErrorKind::SamePath,
            Self::Pdf(_) => ErrorKind::Pdf,
            Self::Image(_) => ErrorKind::Image,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Io,
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        self.kind().class() == ErrorClass::Fatal
    }

    /// Page index the error belongs to, for per-page errors.
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::PageRender { page, .. } | Self::Recognition { page, .. } => Some(*page),
            _ => None,
        }
    }
}
