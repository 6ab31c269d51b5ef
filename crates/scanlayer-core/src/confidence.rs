// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confidence evaluation: page-level aggregation of per-word confidences.

use crate::types::OcrWord;

/// Lowest valid confidence.
pub const MIN_CONFIDENCE: f64 = 0.0;
/// Highest valid confidence.
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Clamp a raw engine confidence into [0, 100]. NaN maps to 0.
pub fn clamp(value: f64) -> f64 {
    if value.is_nan() {
        MIN_CONFIDENCE
    } else {
        value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }
}

/// Arithmetic mean of all word confidences; 0 when there are no words.
pub fn average(words: &[OcrWord]) -> f64 {
    if words.is_empty() {
        return MIN_CONFIDENCE;
    }
    let sum: f64 = words.iter().map(|w| clamp(w.confidence)).sum();
    clamp(sum / words.len() as f64)
}
