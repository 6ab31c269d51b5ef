// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting: an append-only log of state changes, the
// "N/M pages done" message with a remaining-time estimate, and the sink
// trait callers implement to receive both.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::state::PipelineState;

/// Receives pipeline events. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn state_changed(&self, _state: PipelineState) {}

    /// A page finished; `message` is the human-readable progress line.
    fn page_finished(&self, _done: usize, _total: usize, _message: &str) {}
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn state_changed(&self, state: PipelineState) {
        debug!(%state, "Pipeline state");
    }

    fn page_finished(&self, done: usize, total: usize, message: &str) {
        info!(done, total, "{message}");
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEntry {
    pub at: DateTime<Utc>,
    pub state: PipelineState,
}

/// Append-only record of every state change, plus completion messages.
#[derive(Debug, Default)]
pub struct ProgressLog {
    entries: Mutex<Vec<ProgressEntry>>,
    messages: Mutex<Vec<String>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// States recorded for one page, in order.
    pub fn page_states(&self, index: usize) -> Vec<PipelineState> {
        self.entries()
            .into_iter()
            .map(|e| e.state)
            .filter(|s| s.page() == Some(index))
            .collect()
    }
}

impl ProgressSink for ProgressLog {
    fn state_changed(&self, state: PipelineState) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(ProgressEntry { at: Utc::now(), state });
        }
    }

    fn page_finished(&self, _done: usize, _total: usize, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_owned());
        }
    }
}

/// Message emitted instead of progress for a document with no pages.
pub const EMPTY_DOCUMENT_MESSAGE: &str = "The PDF has no pages; nothing to do.";

/// `mm:ss`, or `hh:mm:ss` from one hour up; `unknown` when there is no estimate.
pub fn format_remaining(estimate: Option<Duration>) -> String {
    let Some(estimate) = estimate else {
        return "unknown".to_owned();
    };
    let total = estimate.as_secs_f64().round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Remaining-time estimate from the mean time per completed page.
pub fn estimate_remaining(done: usize, total: usize, elapsed: Duration) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    let per_page = elapsed.as_secs_f64() / done as f64;
    Some(Duration::from_secs_f64(per_page * total.saturating_sub(done) as f64))
}

/// `"{done}/{total} pages done, estimated remaining {time}"`.
pub fn progress_message(done: usize, total: usize, elapsed: Duration) -> String {
    if total == 0 {
        return "Progress: page count unknown".to_owned();
    }
    format!(
        "{done}/{total} pages done, estimated remaining {}",
        format_remaining(estimate_remaining(done, total, elapsed))
    )
}

/// Counts completed pages and produces progress messages against a clock
/// started at construction.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    total: usize,
    done: Mutex<usize>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            done: Mutex::new(0),
        }
    }

    /// Record one more finished page and return `(done, message)`.
    pub fn page_done(&self) -> (usize, String) {
        let done = match self.done.lock() {
            Ok(mut done) => {
                *done += 1;
                *done
            }
            Err(_) => self.total,
        };
        (done, progress_message(done, self.total, self.started.elapsed()))
    }
}
