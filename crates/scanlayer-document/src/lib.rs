// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanlayer-document: per-page building blocks of the OCR pipeline.
//
// Rasterizing PDF pages, running the recognizer, enhancing low-confidence
// bitmaps, choosing between passes, and writing the invisible text layer.
// Also opens encrypted inputs and removes passwords.

pub mod compose;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod raster;
pub mod scan;

pub use compose::{PlacedWord, SearchablePdf, layout_text_layer};
pub use image::processor::ImageProcessor;
pub use ocr::{Recognizer, TesseractEngine};
pub use pdf::{SourceDocument, unlock_bytes, unlock_file};
pub use raster::{PageRasterizer, XObjectRasterizer, default_rasterizer};
pub use scan::enhance::Preprocessor;
pub use scan::select::{PreprocessingDecision, Selection};
