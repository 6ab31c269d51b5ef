// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result selection between the original and enhanced recognition passes.

use scanlayer_core::types::{OcrResult, RecognitionPath};

/// Which pass produced the result kept for a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Recognized from the original bitmap.
    Direct(OcrResult),
    /// Recognized from the binarized, upscaled bitmap.
    Enhanced(OcrResult),
}

impl Selection {
    pub fn result(&self) -> &OcrResult {
        match self {
            Self::Direct(r) | Self::Enhanced(r) => r,
        }
    }

    pub fn path(&self) -> RecognitionPath {
        match self {
            Self::Direct(_) => RecognitionPath::Direct,
            Self::Enhanced(_) => RecognitionPath::Enhanced,
        }
    }
}

/// Outcome of the try / measure / maybe retry / pick step for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingDecision {
    /// Whether the enhanced pass ran.
    pub retried: bool,
    pub selection: Selection,
    pub original_confidence: f64,
    pub enhanced_confidence: Option<f64>,
}

impl PreprocessingDecision {
    /// Decision for a page that met the threshold on the first pass.
    pub fn direct(original: OcrResult) -> Self {
        Self {
            retried: false,
            original_confidence: original.average_confidence(),
            enhanced_confidence: None,
            selection: Selection::Direct(original),
        }
    }

    /// Decision after both passes ran.
    pub fn after_retry(original: OcrResult, enhanced: OcrResult) -> Self {
        let original_confidence = original.average_confidence();
        let enhanced_confidence = enhanced.average_confidence();
        Self {
            retried: true,
            original_confidence,
            enhanced_confidence: Some(enhanced_confidence),
            selection: select(original, enhanced),
        }
    }

    pub fn final_confidence(&self) -> f64 {
        self.selection.result().average_confidence()
    }
}

/// Enhancement runs only when the first pass is strictly below `threshold`.
pub fn needs_enhancement(original_confidence: f64, threshold: f64) -> bool {
    original_confidence < threshold
}

/// The result with the higher average confidence; ties keep the original.
pub fn select(original: OcrResult, enhanced: OcrResult) -> Selection {
    if enhanced.average_confidence() > original.average_confidence() {
        Selection::Enhanced(enhanced)
    } else {
        Selection::Direct(original)
    }
}
