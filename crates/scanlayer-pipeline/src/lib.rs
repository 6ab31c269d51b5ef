// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanlayer Pipeline: per-page adaptive OCR, bounded page concurrency,
// progress reporting, and assembly of the searchable PDF or text output.

pub mod executor;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod state;

pub use executor::{CancelToken, ExecutionStrategy};
pub use output::format_text;
pub use page::{OutputMode, PageOutcome, PageProcessor, PageSettings};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use progress::{ProgressLog, ProgressSink, ProgressTracker, TracingSink};
pub use state::{PageStage, PipelineState};
