// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR adapter: the recognizer seam, the Tesseract implementation, and
// engine discovery.

pub mod engine;
pub mod locate;
pub mod tesseract;
pub mod tsv;

pub use engine::{Recognizer, word_separator};
pub use tesseract::TesseractEngine;
