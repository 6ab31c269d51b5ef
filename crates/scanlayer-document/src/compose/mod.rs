// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-layer composer: coordinate mapping, word layout, font discovery, and
// searchable PDF output.

pub mod font;
pub mod geometry;
pub mod layer;

pub use geometry::to_page_space;
pub use layer::{PlacedWord, SearchablePdf, layout_text_layer};
