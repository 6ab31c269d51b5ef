// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition engine seam.

use image::DynamicImage;
use scanlayer_core::error::Result;
use scanlayer_core::types::OcrWord;

/// A text-recognition engine working on one bitmap at a time.
///
/// Implementations return word boxes in the pixel space of the bitmap they
/// were given. Failures should be `ScanlayerError::Recognition` carrying
/// `page`.
pub trait Recognizer: Send + Sync {
    /// Recognize words in `image`, rendered at `dpi`.
    fn recognize(&self, image: &DynamicImage, page: usize, dpi: u32) -> Result<Vec<OcrWord>>;

    /// Configured language code.
    fn language(&self) -> &str;
}

/// Languages whose words are joined without spaces when rebuilding text.
pub fn joins_without_space(language: &str) -> bool {
    language
        .split('+')
        .next()
        .map(|primary| primary.starts_with("jpn") || primary.starts_with("chi_"))
        .unwrap_or(false)
}

/// Separator between words on the same line for `language`.
pub fn word_separator(language: &str) -> &'static str {
    if joins_without_space(language) { "" } else { " " }
}
