// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One page through the adaptive OCR steps: render, recognize, enhance and
// re-recognize when the first pass is below the threshold, select, and lay
// out the text layer.

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, instrument, warn};

use scanlayer_core::config::{PageErrorPolicy, ScanlayerConfig};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::{OcrResult, PageGeometry, PageReport, PageStatus, RecognitionPath, ReportedError};
use scanlayer_document::compose::{PlacedWord, layout_text_layer};
use scanlayer_document::ocr::{Recognizer, word_separator};
use scanlayer_document::pdf::source::{DEFAULT_PAGE_SIZE, SourceDocument};
use scanlayer_document::raster::PageRasterizer;
use scanlayer_document::scan::enhance::Preprocessor;
use scanlayer_document::scan::select::{PreprocessingDecision, Selection, needs_enhancement};

use crate::progress::ProgressSink;
use crate::state::{PageMachine, PageStage};

/// What the run produces, which decides what a page keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Keep the bitmap and placed words for a searchable PDF.
    SearchablePdf,
    /// Keep only the recognized text.
    Text,
}

/// Settings a page needs, copied from the run's configuration snapshot.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub dpi: u32,
    pub confidence_threshold: f64,
    pub render_min_confidence: f64,
    pub policy: PageErrorPolicy,
    pub mode: OutputMode,
    pub word_separator: &'static str,
}

impl PageSettings {
    pub fn from_config(config: &ScanlayerConfig, mode: OutputMode) -> Self {
        Self {
            dpi: config.dpi,
            confidence_threshold: config.confidence_threshold,
            render_min_confidence: config.render_min_confidence,
            policy: config.page_error_policy,
            mode,
            word_separator: word_separator(&config.language),
        }
    }
}

/// Everything a finished page hands to assembly.
#[derive(Debug)]
pub struct PageOutcome {
    pub report: PageReport,
    /// Page bitmap and its geometry; `None` in text mode or when rendering
    /// failed. Dropped once the page is composed.
    pub bitmap: Option<(DynamicImage, PageGeometry)>,
    /// Page size in points, for an empty page when there is no bitmap.
    pub page_size: (f64, f64),
    pub words: Vec<PlacedWord>,
    pub text: String,
}

/// Runs the per-page steps. Shared by all workers of a run.
pub struct PageProcessor {
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<dyn Recognizer>,
    preprocessor: Preprocessor,
    settings: PageSettings,
    sink: Arc<dyn ProgressSink>,
}

impl PageProcessor {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        recognizer: Arc<dyn Recognizer>,
        preprocessor: Preprocessor,
        settings: PageSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            preprocessor,
            settings,
            sink,
        }
    }

    pub fn settings(&self) -> &PageSettings {
        &self.settings
    }

    /// Process page `index`.
    ///
    /// Rendering and recognition failures become a `Failed` page under the
    /// skip policy; under the abort policy, and for fatal errors, they are
    /// returned.
    #[instrument(skip(self, source), fields(page = index + 1))]
    pub fn process(&self, source: &SourceDocument, index: usize) -> Result<PageOutcome> {
        let settings = &self.settings;
        let mut machine = PageMachine::new(index);

        self.enter(&mut machine, PageStage::Rendering)?;
        let (bitmap, geometry) = match self.rasterizer.render(source, index, settings.dpi) {
            Ok(rendered) => rendered,
            Err(err) => return self.failed(source, index, &mut machine, err, None),
        };
        debug!(width = geometry.width_px, height = geometry.height_px, "Page rendered");

        self.enter(&mut machine, PageStage::Recognizing)?;
        let original = match self.recognizer.recognize(&bitmap, index, settings.dpi) {
            Ok(words) => OcrResult::new(words, 1.0),
            Err(err) => return self.failed(source, index, &mut machine, err, Some((bitmap, geometry))),
        };
        let original_confidence = original.average_confidence();
        debug!(confidence = original_confidence, words = original.words().len(), "First pass");

        let mut retry_error: Option<ScanlayerError> = None;
        let decision = if needs_enhancement(original_confidence, settings.confidence_threshold) {
            self.enter(&mut machine, PageStage::Enhancing)?;
            let factor = self.preprocessor.upscale_factor();
            let enhanced_bitmap = self.preprocessor.enhance(&bitmap);

            self.enter(&mut machine, PageStage::ReRecognizing)?;
            let enhanced_dpi = (settings.dpi as f64 * factor).round() as u32;
            match self.recognizer.recognize(&enhanced_bitmap, index, enhanced_dpi) {
                Ok(words) => {
                    let enhanced = OcrResult::new(words, factor);
                    debug!(confidence = enhanced.average_confidence(), words = enhanced.words().len(), "Enhanced pass");
                    PreprocessingDecision::after_retry(original, enhanced)
                }
                Err(err) if err.is_fatal() || settings.policy == PageErrorPolicy::Abort => return Err(err),
                Err(err) => {
                    warn!(error = %err, "Enhanced pass failed; keeping first-pass result");
                    retry_error = Some(err);
                    PreprocessingDecision {
                        retried: true,
                        selection: Selection::Direct(original),
                        original_confidence,
                        enhanced_confidence: None,
                    }
                }
            }
        } else {
            PreprocessingDecision::direct(original)
        };

        self.enter(&mut machine, PageStage::Composing)?;
        let final_confidence = decision.final_confidence();
        let status = if decision.retried && final_confidence < settings.confidence_threshold {
            warn!(
                confidence = final_confidence,
                threshold = settings.confidence_threshold,
                "Page stays below the confidence threshold after enhancement"
            );
            PageStatus::PartiallySucceeded
        } else {
            PageStatus::Succeeded
        };

        let path = decision.selection.path();
        let result = decision.selection.result();
        let text = result.text(settings.word_separator);
        let (words, bitmap) = match settings.mode {
            OutputMode::SearchablePdf => (
                layout_text_layer(result, &geometry, settings.render_min_confidence),
                Some((bitmap, geometry)),
            ),
            OutputMode::Text => (Vec::new(), None),
        };

        let report = PageReport {
            index,
            status,
            path,
            confidence: final_confidence,
            original_confidence: Some(decision.original_confidence),
            enhanced_confidence: decision.enhanced_confidence,
            word_count: result.words().len(),
            error: retry_error.as_ref().map(ReportedError::from),
        };
        debug!(?path, placed = words.len(), "Page composed");

        Ok(PageOutcome {
            report,
            bitmap,
            page_size: (geometry.width_pt, geometry.height_pt),
            words,
            text,
        })
    }

    fn enter(&self, machine: &mut PageMachine, stage: PageStage) -> Result<()> {
        let state = machine.advance(stage)?;
        self.sink.state_changed(state);
        Ok(())
    }

    /// A page whose rendering or recognition failed: emitted without text.
    fn failed(
        &self,
        source: &SourceDocument,
        index: usize,
        machine: &mut PageMachine,
        err: ScanlayerError,
        bitmap: Option<(DynamicImage, PageGeometry)>,
    ) -> Result<PageOutcome> {
        if err.is_fatal() || self.settings.policy == PageErrorPolicy::Abort {
            return Err(err);
        }
        warn!(page = index + 1, error = %err, "Page failed; emitting it without a text layer");
        self.enter(machine, PageStage::Composing)?;

        let page_size = match &bitmap {
            Some((_, geometry)) => (geometry.width_pt, geometry.height_pt),
            None => source.page_size(index).unwrap_or(DEFAULT_PAGE_SIZE),
        };
        let bitmap = match self.settings.mode {
            OutputMode::SearchablePdf => bitmap,
            OutputMode::Text => None,
        };
        Ok(PageOutcome {
            report: PageReport {
                index,
                status: PageStatus::Failed,
                path: RecognitionPath::None,
                confidence: 0.0,
                original_confidence: None,
                enhanced_confidence: None,
                word_count: 0,
                error: Some(ReportedError::from(&err)),
            },
            bitmap,
            page_size,
            words: Vec::new(),
            text: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use image::{GenericImageView, GrayImage, Luma};
    use lopdf::dictionary;
    use scanlayer_core::config::BinarizationMode;
    use scanlayer_core::types::{LineKey, OcrWord, PixelBox};

    use super::*;
    use crate::progress::ProgressLog;
    use crate::state::PipelineState;

    /// Rasterizer that ignores the document and returns a fixed grey page.
    struct FlatRasterizer {
        fail: bool,
    }

    impl PageRasterizer for FlatRasterizer {
        fn render(&self, _source: &SourceDocument, index: usize, dpi: u32) -> Result<(DynamicImage, PageGeometry)> {
            if self.fail {
                return Err(ScanlayerError::PageRender { page: index, message: "corrupt".into() });
            }
            let geometry = PageGeometry::at_dpi(index, 72.0, 72.0, dpi);
            let image = GrayImage::from_pixel(geometry.width_px, geometry.height_px, Luma([180]));
            Ok((DynamicImage::ImageLuma8(image), geometry))
        }

        fn name(&self) -> &'static str {
            "flat"
        }
    }

    /// Returns one word per call with scripted confidences; an enhanced
    /// bitmap is recognized by its size.
    struct Scripted {
        first: f64,
        second: Option<f64>,
        calls: Mutex<Vec<u32>>,
    }

    impl Recognizer for Scripted {
        fn recognize(&self, image: &DynamicImage, page: usize, dpi: u32) -> Result<Vec<OcrWord>> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(dpi);
            }
            let enhanced = image.width() > 72;
            let conf = if enhanced {
                self.second.ok_or(ScanlayerError::Recognition { page, message: "engine crashed".into() })?
            } else {
                self.first
            };
            let (w, h) = image.dimensions();
            Ok(vec![OcrWord::new(
                "word",
                PixelBox::new(w as f64 / 4.0, h as f64 / 4.0, w as f64 / 2.0, h as f64 / 4.0),
                conf,
                LineKey::default(),
            )])
        }

        fn language(&self) -> &str {
            "eng"
        }
    }

    fn source() -> SourceDocument {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id });
        doc.objects.insert(
            pages_id,
            lopdf::Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![lopdf::Object::Reference(page)],
                "Count" => 1_i64,
                "MediaBox" => vec![0.into(), 0.into(), 72.into(), 72.into()],
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        SourceDocument::from_bytes(&buf, None).unwrap()
    }

    fn processor(
        fail_render: bool,
        first: f64,
        second: Option<f64>,
        policy: PageErrorPolicy,
    ) -> (PageProcessor, Arc<Scripted>, Arc<ProgressLog>) {
        let recognizer = Arc::new(Scripted { first, second, calls: Mutex::new(Vec::new()) });
        let log = Arc::new(ProgressLog::new());
        let settings = PageSettings {
            dpi: 72,
            confidence_threshold: 65.0,
            render_min_confidence: 50.0,
            policy,
            mode: OutputMode::SearchablePdf,
            word_separator: " ",
        };
        let processor = PageProcessor::new(
            Arc::new(FlatRasterizer { fail: fail_render }),
            recognizer.clone(),
            Preprocessor::new(BinarizationMode::default(), 1.5),
            settings,
            log.clone(),
        );
        (processor, recognizer, log)
    }

    #[test]
    fn confident_page_skips_enhancement() {
        let (p, rec, log) = processor(false, 90.0, Some(99.0), PageErrorPolicy::Skip);
        let out = p.process(&source(), 0).unwrap();
        assert_eq!(out.report.status, PageStatus::Succeeded);
        assert_eq!(out.report.path, RecognitionPath::Direct);
        assert_eq!(out.report.enhanced_confidence, None);
        assert_eq!(rec.calls.lock().unwrap().len(), 1);
        assert_eq!(log.page_states(0).len(), 3);
        assert_eq!(out.text, "word");
    }

    #[test]
    fn low_page_uses_better_enhanced_pass() {
        let (p, rec, log) = processor(false, 40.0, Some(80.0), PageErrorPolicy::Skip);
        let out = p.process(&source(), 0).unwrap();
        assert_eq!(out.report.path, RecognitionPath::Enhanced);
        assert_eq!(out.report.status, PageStatus::Succeeded);
        assert_eq!(out.report.original_confidence, Some(40.0));
        assert_eq!(out.report.enhanced_confidence, Some(80.0));
        // Second pass runs at the upscaled resolution.
        assert_eq!(*rec.calls.lock().unwrap(), vec![72, 108]);
        assert_eq!(
            log.page_states(0).last(),
            Some(&PipelineState::Page { index: 0, stage: PageStage::Composing })
        );
        // Enhanced boxes are mapped back onto the 72pt page.
        let b = out.words[0].bbox;
        assert!((b.x - 18.0).abs() < 1.0 && (b.width - 36.0).abs() < 1.0);
    }

    #[test]
    fn enhancement_that_does_not_help_is_partial() {
        let (p, _, _) = processor(false, 40.0, Some(30.0), PageErrorPolicy::Skip);
        let out = p.process(&source(), 0).unwrap();
        assert_eq!(out.report.path, RecognitionPath::Direct);
        assert_eq!(out.report.status, PageStatus::PartiallySucceeded);
        assert_eq!(out.report.confidence, 40.0);
        // Below the render floor: nothing placed, text still extracted.
        assert!(out.words.is_empty());
        assert_eq!(out.text, "word");
    }

    #[test]
    fn failed_enhanced_pass_keeps_first_result() {
        let (p, _, _) = processor(false, 40.0, None, PageErrorPolicy::Skip);
        let out = p.process(&source(), 0).unwrap();
        assert_eq!(out.report.status, PageStatus::PartiallySucceeded);
        assert_eq!(out.report.word_count, 1);
        assert!(out.report.error.is_some());
    }

    #[test]
    fn render_failure_is_recorded_under_skip() {
        let (p, _, _) = processor(true, 90.0, None, PageErrorPolicy::Skip);
        let out = p.process(&source(), 0).unwrap();
        assert_eq!(out.report.status, PageStatus::Failed);
        assert_eq!(out.report.path, RecognitionPath::None);
        assert!(out.bitmap.is_none());
        assert_eq!(out.page_size, (72.0, 72.0));
    }

    #[test]
    fn render_failure_aborts_under_abort() {
        let (p, _, _) = processor(true, 90.0, None, PageErrorPolicy::Abort);
        let err = p.process(&source(), 0).unwrap_err();
        assert!(matches!(err, ScanlayerError::PageRender { page: 0, .. }));
    }
}
