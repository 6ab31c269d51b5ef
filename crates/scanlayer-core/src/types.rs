// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: page geometry, OCR words and results, run reports.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence;
use crate::error::{ErrorKind, ScanlayerError};

/// PDF user space unit: 1/72 inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Unique identifier for one convert / extract run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Size and resolution of one rasterized page.
///
/// `width_pt`/`height_pt` are the page's intrinsic size (after `/Rotate`);
/// `width_px`/`height_px` are the bitmap dimensions at `dpi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub index: usize,
    pub width_pt: f64,
    pub height_pt: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
}

impl PageGeometry {
    /// Geometry of a page rendered at `dpi`: pixels = points × dpi / 72.
    pub fn at_dpi(index: usize, width_pt: f64, height_pt: f64, dpi: u32) -> Self {
        let k = dpi as f64 / POINTS_PER_INCH;
        Self {
            index,
            width_pt,
            height_pt,
            width_px: ((width_pt * k).round() as u32).max(1),
            height_px: ((height_pt * k).round() as u32).max(1),
            dpi,
        }
    }

    /// Horizontal points per bitmap pixel.
    pub fn x_scale(&self) -> f64 {
        self.width_pt / self.width_px as f64
    }

    /// Vertical points per bitmap pixel.
    pub fn y_scale(&self) -> f64 {
        self.height_pt / self.height_px as f64
    }
}

/// Axis-aligned box in bitmap pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Axis-aligned box in PDF points, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PointBox {
    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Position of a word in the engine's block / paragraph / line hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct LineKey {
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

/// One recognized word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// Box in the coordinate space of the bitmap that was recognized.
    pub bbox: PixelBox,
    /// Engine confidence, always within [0, 100].
    pub confidence: f64,
    pub line: LineKey,
}

impl OcrWord {
    /// Build a word, clamping the confidence into [0, 100] (NaN becomes 0).
    pub fn new(text: impl Into<String>, bbox: PixelBox, confidence: f64, line: LineKey) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: confidence::clamp(confidence),
            line,
        }
    }
}

/// Output of one recognition pass over one bitmap.
///
/// Immutable after construction. `coordinate_scale` records how much larger
/// the recognized bitmap was than the original page bitmap (1.0 for the
/// original pass, the upscale factor for the enhanced pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    words: Vec<OcrWord>,
    coordinate_scale: f64,
    average_confidence: f64,
}

impl OcrResult {
    pub fn new(words: Vec<OcrWord>, coordinate_scale: f64) -> Self {
        let average_confidence = confidence::average(&words);
        Self {
            words,
            coordinate_scale,
            average_confidence,
        }
    }

    /// A result with no words (average confidence 0).
    pub fn empty(coordinate_scale: f64) -> Self {
        Self::new(Vec::new(), coordinate_scale)
    }

    pub fn words(&self) -> &[OcrWord] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn coordinate_scale(&self) -> f64 {
        self.coordinate_scale
    }

    pub fn average_confidence(&self) -> f64 {
        self.average_confidence
    }

    /// Rebuild plain text from the word hierarchy.
    ///
    /// Words on the same line are joined with `word_separator`; lines are
    /// separated by newlines and blocks by a blank line.
    pub fn text(&self, word_separator: &str) -> String {
        let mut out = String::new();
        let mut previous: Option<LineKey> = None;

        for word in &self.words {
            match previous {
                None => {}
                Some(prev) if prev == word.line => out.push_str(word_separator),
                Some(prev) if prev.block != word.line.block => out.push_str("\n\n"),
                Some(_) => out.push('\n'),
            }
            out.push_str(&word.text);
            previous = Some(word.line);
        }

        out
    }
}

/// Which recognition pass produced a page's final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionPath {
    /// First pass on the original bitmap.
    Direct,
    /// Second pass on the binarized, upscaled bitmap.
    Enhanced,
    /// No usable recognition (page failed).
    None,
}

/// Outcome class of one page in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Final confidence met the threshold.
    Succeeded,
    /// Enhanced pass attempted but confidence stayed below the threshold.
    PartiallySucceeded,
    /// Rendering or recognition failed; page emitted without a text layer.
    Failed,
}

/// Error recorded against a page or a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ScanlayerError> for ReportedError {
    fn from(err: &ScanlayerError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Per-page entry of the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub index: usize,
    pub status: PageStatus,
    pub path: RecognitionPath,
    /// Confidence of the selected result.
    pub confidence: f64,
    pub original_confidence: Option<f64>,
    pub enhanced_confidence: Option<f64>,
    pub word_count: usize,
    pub error: Option<ReportedError>,
}

/// End-of-run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub input: Option<PathBuf>,
    /// SHA-256 of the input bytes.
    pub input_sha256: String,
    pub confidence_threshold: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: Vec<PageReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.count(PageStatus::Succeeded)
    }

    pub fn partially_succeeded(&self) -> usize {
        self.count(PageStatus::PartiallySucceeded)
    }

    pub fn failed(&self) -> usize {
        self.count(PageStatus::Failed)
    }

    /// Pages that completed with low confidence.
    pub fn quality_warnings(&self) -> impl Iterator<Item = &PageReport> {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::PartiallySucceeded)
    }

    fn count(&self, status: PageStatus) -> usize {
        self.pages.iter().filter(|p| p.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, block: u32, line: u32, conf: f64) -> OcrWord {
        OcrWord::new(
            text,
            PixelBox::new(0.0, 0.0, 10.0, 10.0),
            conf,
            LineKey {
                block,
                paragraph: 1,
                line,
            },
        )
    }

    #[test]
    fn geometry_follows_dpi() {
        let g = PageGeometry::at_dpi(0, 612.0, 792.0, 300);
        assert_eq!(g.width_px, 2550);
        assert_eq!(g.height_px, 3300);
        assert!((g.x_scale() - 72.0 / 300.0).abs() < 1e-9);
    }

    #[test]
    fn word_confidence_is_clamped() {
        assert_eq!(word("a", 1, 1, 140.0).confidence, 100.0);
        assert_eq!(word("a", 1, 1, -1.0).confidence, 0.0);
        assert_eq!(word("a", 1, 1, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn empty_result_has_zero_confidence() {
        let result = OcrResult::empty(1.0);
        assert_eq!(result.average_confidence(), 0.0);
        assert!(result.is_empty());
    }

    #[test]
    fn text_respects_line_and_block_breaks() {
        let result = OcrResult::new(
            vec![
                word("Hello", 1, 1, 90.0),
                word("world", 1, 1, 90.0),
                word("second", 1, 2, 90.0),
                word("next", 2, 1, 90.0),
            ],
            1.0,
        );
        assert_eq!(result.text(" "), "Hello world\nsecond\n\nnext");
        assert_eq!(result.text(""), "Helloworld\nsecond\n\nnext");
    }

    #[test]
    fn report_counts_statuses() {
        let page = |index, status| PageReport {
            index,
            status,
            path: RecognitionPath::Direct,
            confidence: 0.0,
            original_confidence: None,
            enhanced_confidence: None,
            word_count: 0,
            error: None,
        };
        let now = Utc::now();
        let report = RunReport {
            run_id: RunId::new(),
            input: None,
            input_sha256: String::new(),
            confidence_threshold: 65.0,
            started_at: now,
            finished_at: now,
            pages: vec![
                page(0, PageStatus::Succeeded),
                page(1, PageStatus::PartiallySucceeded),
                page(2, PageStatus::Failed),
                page(3, PageStatus::Succeeded),
            ],
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.partially_succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.quality_warnings().next().map(|p| p.index), Some(1));
    }
}
