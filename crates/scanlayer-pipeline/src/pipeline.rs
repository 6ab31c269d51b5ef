// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline: file-level convert and extract.
//
// A `Pipeline` is built once per configuration. Building resolves the OCR
// engine; `convert` resolves the font before the first page. Both failures
// are fatal and happen before any page work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use scanlayer_core::config::ScanlayerConfig;
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::paths::{ensure_distinct, require_input};
use scanlayer_core::types::{PageReport, RunId, RunReport};
use scanlayer_document::compose::SearchablePdf;
use scanlayer_document::compose::font::locate_font;
use scanlayer_document::ocr::{Recognizer, TesseractEngine};
use scanlayer_document::pdf::SourceDocument;
use scanlayer_document::raster::{PageRasterizer, default_rasterizer};
use scanlayer_document::scan::enhance::Preprocessor;

use crate::executor::{CancelToken, ExecutionStrategy};
use crate::output::{Assembler, PdfAssembler, TextAssembler, write_artifact};
use crate::page::{OutputMode, PageProcessor, PageSettings};
use crate::progress::{EMPTY_DOCUMENT_MESSAGE, ProgressSink, ProgressTracker, TracingSink};
use crate::state::{PipelineState, RunMachine};

/// Collects the collaborators of a `Pipeline`. Anything not supplied is
/// resolved from the configuration at `build`.
pub struct PipelineBuilder {
    config: ScanlayerConfig,
    recognizer: Option<Arc<dyn Recognizer>>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    sink: Option<Arc<dyn ProgressSink>>,
    cancel: Option<CancelToken>,
}

impl PipelineBuilder {
    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate the configuration and locate the OCR engine.
    #[instrument(skip(self), fields(language = %self.config.language))]
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let recognizer: Arc<dyn Recognizer> = match self.recognizer {
            Some(recognizer) => recognizer,
            None => Arc::new(TesseractEngine::from_config(&self.config)?),
        };
        let rasterizer: Arc<dyn PageRasterizer> = match self.rasterizer {
            Some(rasterizer) => rasterizer,
            None => Arc::from(default_rasterizer()),
        };
        info!(
            rasterizer = rasterizer.name(),
            workers = self.config.workers,
            threshold = self.config.confidence_threshold,
            "Pipeline ready"
        );
        Ok(Pipeline {
            preprocessor: Preprocessor::from_config(&self.config),
            strategy: ExecutionStrategy::from_workers(self.config.workers),
            config: self.config,
            recognizer,
            rasterizer,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// Adaptive OCR over whole documents.
pub struct Pipeline {
    config: ScanlayerConfig,
    recognizer: Arc<dyn Recognizer>,
    rasterizer: Arc<dyn PageRasterizer>,
    preprocessor: Preprocessor,
    strategy: ExecutionStrategy,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn builder(config: ScanlayerConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            recognizer: None,
            rasterizer: None,
            sink: None,
            cancel: None,
        }
    }

    /// Configuration snapshot taken at build time.
    pub fn config(&self) -> &ScanlayerConfig {
        &self.config
    }

    /// Token that stops the current run at the next page boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Convert the image-only PDF at `input` into a searchable PDF at `output`.
    #[instrument(skip(self, password), fields(input = %input.display(), output = %output.display()))]
    pub async fn convert(&self, input: &Path, output: &Path, password: Option<&str>) -> Result<RunReport> {
        ensure_distinct(input, output)?;
        require_input(input)?;
        let data = tokio::fs::read(input).await?;
        let (bytes, report) = self.convert_bytes(&data, password, Some(input)).await?;
        write_artifact(output, &bytes).await?;
        log_summary(&report);
        Ok(report)
    }

    /// Convert PDF bytes; returns the searchable PDF and the run report.
    pub async fn convert_bytes(
        &self,
        data: &[u8],
        password: Option<&str>,
        input: Option<&Path>,
    ) -> Result<(Vec<u8>, RunReport)> {
        let font_path = locate_font(&self.config.language, self.config.font_path.as_deref(), &self.config.font_dirs)?;
        let font_bytes = tokio::fs::read(&font_path).await.map_err(|err| {
            ScanlayerError::FontNotFound(format!("{} could not be read: {err}", font_path.display()))
        })?;
        let title = input
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Scanlayer document".to_owned());
        let pdf = SearchablePdf::new(&title, &font_bytes)?;

        self.run(data, password, input, OutputMode::SearchablePdf, PdfAssembler::new(pdf))
            .await
    }

    /// Extract text from the image-only PDF at `input` into `output`.
    #[instrument(skip(self, password), fields(input = %input.display(), output = %output.display()))]
    pub async fn extract(&self, input: &Path, output: &Path, password: Option<&str>) -> Result<RunReport> {
        ensure_distinct(input, output)?;
        require_input(input)?;
        let data = tokio::fs::read(input).await?;
        let (text, report) = self.extract_text(&data, password, Some(input)).await?;
        write_artifact(output, text.as_bytes()).await?;
        log_summary(&report);
        Ok(report)
    }

    /// Extract text from PDF bytes; returns the formatted text and the run report.
    pub async fn extract_text(
        &self,
        data: &[u8],
        password: Option<&str>,
        input: Option<&Path>,
    ) -> Result<(String, RunReport)> {
        let config = &self.config;
        let text = TextAssembler::new(|index| config.page_header(index));
        self.run(data, password, input, OutputMode::Text, text).await
    }

    /// Process every page, handing each to `assembler` as soon as all
    /// earlier pages have been handed over.
    async fn run<A: Assembler>(
        &self,
        data: &[u8],
        password: Option<&str>,
        input: Option<&Path>,
        mode: OutputMode,
        mut assembler: A,
    ) -> Result<(A::Output, RunReport)> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let input_sha256 = hex::encode(Sha256::digest(data));
        let mut machine = RunMachine::new();
        let mut pages: Vec<PageReport> = Vec::new();

        let outcome = async {
            let source = Arc::new(SourceDocument::from_bytes(data, password)?);
            let total = source.page_count();
            info!(%run_id, pages = total, ?mode, "Run started");
            if total == 0 {
                self.sink.page_finished(0, 0, EMPTY_DOCUMENT_MESSAGE);
            }

            let processor = Arc::new(PageProcessor::new(
                Arc::clone(&self.rasterizer),
                Arc::clone(&self.recognizer),
                self.preprocessor,
                PageSettings::from_config(&self.config, mode),
                Arc::clone(&self.sink),
            ));
            let tracker = Arc::new(ProgressTracker::new(total));
            let sink = Arc::clone(&self.sink);

            self.strategy
                .run(
                    total,
                    &self.cancel,
                    move |index| {
                        let outcome = processor.process(&source, index)?;
                        let (done, message) = tracker.page_done();
                        sink.page_finished(done, total, &message);
                        Ok(outcome)
                    },
                    |_, outcome| {
                        pages.push(outcome.report.clone());
                        assembler.add_page(outcome)
                    },
                )
                .await
        }
        .await;

        if let Err(err) = outcome {
            return Err(self.fail(&mut machine, err));
        }

        self.transition(&mut machine, PipelineState::Finalizing)?;
        let artifact = match assembler.finish() {
            Ok(artifact) => artifact,
            Err(err) => return Err(self.fail(&mut machine, err)),
        };
        self.transition(&mut machine, PipelineState::Done)?;

        let report = RunReport {
            run_id,
            input: input.map(PathBuf::from),
            input_sha256,
            confidence_threshold: self.config.confidence_threshold,
            started_at,
            finished_at: Utc::now(),
            pages,
        };
        Ok((artifact, report))
    }

    fn transition(&self, machine: &mut RunMachine, next: PipelineState) -> Result<()> {
        let state = machine.advance(next)?;
        self.sink.state_changed(state);
        Ok(())
    }

    fn fail(&self, machine: &mut RunMachine, err: ScanlayerError) -> ScanlayerError {
        warn!(kind = %err.kind(), error = %err, "Run failed");
        if machine.advance(PipelineState::Failed).is_ok() {
            self.sink.state_changed(PipelineState::Failed);
        }
        err
    }
}

fn log_summary(report: &RunReport) {
    info!(
        pages = report.pages.len(),
        succeeded = report.succeeded(),
        partial = report.partially_succeeded(),
        failed = report.failed(),
        "Run finished"
    );
    for page in report.quality_warnings() {
        warn!(page = page.index + 1, confidence = page.confidence, "Low OCR confidence");
    }
}
