// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Assembly of page outcomes into the run's artifacts, and writing them out.
//
// Assemblers receive pages one at a time in index order. A page's bitmap is
// composed and dropped as soon as its turn comes.

use std::path::Path;

use tracing::{debug, info, instrument};

use scanlayer_core::error::Result;
use scanlayer_core::paths::prepare_output;
use scanlayer_document::compose::SearchablePdf;

use crate::page::PageOutcome;

/// Join page texts into the plain-text artifact.
///
/// Each page becomes `"{header}\n{trimmed text}\n"`; pages are joined with a
/// newline, the whole is trimmed and ends with exactly one newline. An empty
/// document yields `"\n"`.
pub fn format_text<'a, I, H>(pages: I, header: H) -> String
where
    I: IntoIterator<Item = &'a str>,
    H: Fn(usize) -> String,
{
    let blocks: Vec<String> = pages
        .into_iter()
        .enumerate()
        .map(|(index, text)| format!("{}\n{}\n", header(index), text.trim()))
        .collect();
    let mut out = blocks.join("\n").trim().to_owned();
    out.push('\n');
    out
}

/// Builds a run's artifact from its pages.
pub trait Assembler {
    type Output;

    /// Take the next page. Pages arrive in index order.
    fn add_page(&mut self, outcome: PageOutcome) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

/// Searchable PDF output.
pub struct PdfAssembler {
    pdf: SearchablePdf,
}

impl PdfAssembler {
    pub fn new(pdf: SearchablePdf) -> Self {
        Self { pdf }
    }
}

impl Assembler for PdfAssembler {
    type Output = Vec<u8>;

    /// Pages without a bitmap become empty pages of the original size so the
    /// page count is preserved.
    fn add_page(&mut self, outcome: PageOutcome) -> Result<()> {
        match outcome.bitmap {
            Some((bitmap, geometry)) => self.pdf.add_page(bitmap, &geometry, &outcome.words),
            None => {
                debug!(page = outcome.report.index + 1, "Emitting empty page");
                self.pdf.add_blank_page(outcome.page_size.0, outcome.page_size.1);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        Ok(self.pdf.finish())
    }
}

/// Plain-text output; see [`format_text`].
pub struct TextAssembler<H> {
    pages: Vec<String>,
    header: H,
}

impl<H: Fn(usize) -> String> TextAssembler<H> {
    pub fn new(header: H) -> Self {
        Self { pages: Vec::new(), header }
    }
}

impl<H: Fn(usize) -> String> Assembler for TextAssembler<H> {
    type Output = String;

    fn add_page(&mut self, outcome: PageOutcome) -> Result<()> {
        self.pages.push(outcome.text);
        Ok(())
    }

    fn finish(self) -> Result<String> {
        Ok(format_text(self.pages.iter().map(String::as_str), self.header))
    }
}

/// Write `bytes` to `path`, creating parent directories.
#[instrument(skip(bytes), fields(path = %path.display(), bytes = bytes.len()))]
pub async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    prepare_output(path)?;
    tokio::fs::write(path, bytes).await?;
    info!("Output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use scanlayer_core::types::{PageReport, PageStatus, RecognitionPath};

    use super::*;

    fn header(index: usize) -> String {
        format!("--- Page {} ---", index + 1)
    }

    #[test]
    fn pages_are_separated_by_a_blank_line() {
        let text = format_text(["  first page\n", "second"], header);
        assert_eq!(text, "--- Page 1 ---\nfirst page\n\n--- Page 2 ---\nsecond\n");
    }

    #[test]
    fn empty_page_keeps_its_header() {
        let text = format_text(["a", "", "c"], header);
        assert_eq!(text, "--- Page 1 ---\na\n\n--- Page 2 ---\n\n\n--- Page 3 ---\nc\n");
    }

    #[test]
    fn trailing_empty_page_is_trimmed_to_one_newline() {
        let text = format_text(["a", ""], header);
        assert_eq!(text, "--- Page 1 ---\na\n\n--- Page 2 ---\n");
    }

    #[test]
    fn empty_document_is_single_newline() {
        assert_eq!(format_text(std::iter::empty::<&str>(), header), "\n");
    }

    fn outcome(index: usize, text: &str) -> PageOutcome {
        PageOutcome {
            report: PageReport {
                index,
                status: PageStatus::Succeeded,
                path: RecognitionPath::Direct,
                confidence: 90.0,
                original_confidence: Some(90.0),
                enhanced_confidence: None,
                word_count: 1,
                error: None,
            },
            bitmap: None,
            page_size: (612.0, 792.0),
            words: Vec::new(),
            text: text.into(),
        }
    }

    #[test]
    fn text_assembler_keeps_every_page() {
        let mut text = TextAssembler::new(header);
        for (index, body) in ["first", "second", "third"].into_iter().enumerate() {
            text.add_page(outcome(index, body)).unwrap();
        }
        assert_eq!(
            text.finish().unwrap(),
            "--- Page 1 ---\nfirst\n\n--- Page 2 ---\nsecond\n\n--- Page 3 ---\nthird\n"
        );
    }

    #[tokio::test]
    async fn artifact_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        write_artifact(&path, b"hello").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn directory_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_artifact(dir.path(), b"x").await.is_err());
    }
}
