// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bitmap operations shared by the preprocessor and the OCR adapter.

pub mod processor;

pub use processor::ImageProcessor;
