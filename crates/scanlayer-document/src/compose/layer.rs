// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-layer composition: the page bitmap as the visible content, recognized
// words as invisible text on top, serialized with `printpdf` 0.8.

use image::DynamicImage;
use printpdf::{
    FontId, Mm, Op, ParsedFont, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt,
    RawImage, RawImageData, RawImageFormat, TextItem, TextRenderingMode, XObjectTransform,
};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::{OcrResult, PageGeometry, PointBox, POINTS_PER_INCH};
use tracing::{debug, info, instrument};

use super::geometry::to_page_space;

/// Glyph height relative to the word box height.
pub const FONT_SIZE_RATIO: f64 = 0.8;

const MM_PER_PT: f64 = 25.4 / POINTS_PER_INCH;

/// One word ready to be written into the text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    /// Word box on the page, in points.
    pub bbox: PointBox,
    pub font_size: f64,
}

impl PlacedWord {
    /// Text origin: left edge on the box's bottom line.
    pub fn baseline(&self) -> (f64, f64) {
        (self.bbox.x, self.bbox.y)
    }
}

/// Place every word of `result` at or above `min_confidence` on the page
/// described by `geometry`. Words whose box collapses to nothing after
/// clipping are dropped.
pub fn layout_text_layer(result: &OcrResult, geometry: &PageGeometry, min_confidence: f64) -> Vec<PlacedWord> {
    let bitmap = (geometry.width_px, geometry.height_px);
    let page = (geometry.width_pt, geometry.height_pt);

    result
        .words()
        .iter()
        .filter(|w| w.confidence >= min_confidence)
        .filter_map(|w| {
            let bbox = to_page_space(&w.bbox, bitmap, page, result.coordinate_scale());
            if bbox.width <= 0.0 || bbox.height <= 0.0 {
                return None;
            }
            Some(PlacedWord {
                text: w.text.clone(),
                bbox,
                font_size: bbox.height * FONT_SIZE_RATIO,
            })
        })
        .collect()
}

/// Output document under construction, one page per call.
pub struct SearchablePdf {
    doc: PdfDocument,
    font: FontId,
    pages: Vec<PdfPage>,
}

impl SearchablePdf {
    /// Start a document using `font_bytes` for the text layer.
    pub fn new(title: &str, font_bytes: &[u8]) -> Result<Self> {
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let parsed = ParsedFont::from_bytes(font_bytes, 0, &mut warnings).ok_or_else(|| {
            ScanlayerError::FontNotFound("font file could not be parsed for embedding".into())
        })?;
        let mut doc = PdfDocument::new(title);
        let font = doc.add_font(&parsed);
        Ok(Self {
            doc,
            font,
            pages: Vec::new(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append a page showing `bitmap` full-bleed with `words` as invisible
    /// text. The bitmap is consumed; only its encoded copy in the document
    /// remains.
    #[instrument(skip(self, bitmap, words), fields(page = geometry.index, words = words.len()))]
    pub fn add_page(&mut self, bitmap: DynamicImage, geometry: &PageGeometry, words: &[PlacedWord]) {
        let rgb = bitmap.into_rgb8();
        let (px_w, px_h) = rgb.dimensions();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w as usize,
            height: px_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let image_id = self.doc.add_image(&raw);

        // printpdf sizes an image as px / dpi inches; stretch to the page exactly.
        let dpi = geometry.dpi.max(1) as f64;
        let natural_w = px_w as f64 / dpi * POINTS_PER_INCH;
        let natural_h = px_h as f64 / dpi * POINTS_PER_INCH;

        let mut ops = Vec::with_capacity(2 + words.len() * 6);
        ops.push(Op::UseXobject {
            id: image_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some((geometry.width_pt / natural_w) as f32),
                scale_y: Some((geometry.height_pt / natural_h) as f32),
                dpi: Some(dpi as f32),
                rotate: None,
            },
        });

        for word in words {
            let (x, y) = word.baseline();
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextRenderingMode {
                mode: TextRenderingMode::Invisible,
            });
            ops.push(Op::SetFontSize {
                size: Pt(word.font_size as f32),
                font: self.font.clone(),
            });
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(x as f32),
                    y: Pt(y as f32),
                },
            });
            ops.push(Op::WriteText {
                items: vec![TextItem::Text(word.text.clone())],
                font: self.font.clone(),
            });
            ops.push(Op::EndTextSection);
        }

        self.pages.push(PdfPage::new(
            Mm((geometry.width_pt * MM_PER_PT) as f32),
            Mm((geometry.height_pt * MM_PER_PT) as f32),
            ops,
        ));
        debug!(page = geometry.index, "Page composed");
    }

    /// Append an empty page of the given size.
    pub fn add_blank_page(&mut self, width_pt: f64, height_pt: f64) {
        self.pages.push(PdfPage::new(
            Mm((width_pt * MM_PER_PT) as f32),
            Mm((height_pt * MM_PER_PT) as f32),
            Vec::new(),
        ));
    }

    /// Serialize the document.
    pub fn finish(mut self) -> Vec<u8> {
        let pages = std::mem::take(&mut self.pages);
        let count = pages.len();
        self.doc.with_pages(pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        info!(pages = count, bytes = bytes.len(), warnings = warnings.len(), "Searchable PDF serialized");
        bytes
    }
}
