// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline state machine.
//
//   Idle -> Rendering(i) -> Recognizing(i) -> [Enhancing(i) -> ReRecognizing(i)]
//        -> Composing(i) -> (Rendering(i+1) | Finalizing) -> Done
//
// `Failed` is reachable from every non-terminal state. With a worker pool
// several pages are in flight at once, so the machine is tracked per page
// (`PageStage`) and the run as a whole (`PipelineState`).

use std::fmt;

use serde::{Deserialize, Serialize};

use scanlayer_core::error::{Result, ScanlayerError};

/// Where one page is in its processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStage {
    Rendering,
    Recognizing,
    Enhancing,
    ReRecognizing,
    Composing,
}

impl PageStage {
    /// Whether `next` may directly follow `self` on the same page.
    pub fn can_advance_to(self, next: PageStage) -> bool {
        use PageStage::*;
        matches!(
            (self, next),
            (Rendering, Recognizing)
                | (Recognizing, Enhancing)
                | (Recognizing, Composing)
                | (Enhancing, ReRecognizing)
                | (ReRecognizing, Composing)
                // A failed render or recognition still composes an image-only page.
                | (Rendering, Composing)
        )
    }
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageStage::Rendering => "rendering",
            PageStage::Recognizing => "recognizing",
            PageStage::Enhancing => "enhancing",
            PageStage::ReRecognizing => "re-recognizing",
            PageStage::Composing => "composing",
        };
        f.write_str(name)
    }
}

/// State of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Page { index: usize, stage: PageStage },
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Page the state refers to, if any.
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::Page { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Page { index, stage } => write!(f, "{stage} page {}", index + 1),
            Self::Finalizing => f.write_str("finalizing"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Checks that one page moves through the legal stage sequence.
#[derive(Debug)]
pub struct PageMachine {
    index: usize,
    stage: Option<PageStage>,
}

impl PageMachine {
    pub fn new(index: usize) -> Self {
        Self { index, stage: None }
    }

    pub fn stage(&self) -> Option<PageStage> {
        self.stage
    }

    /// Move to `next`, returning the run-level state to report.
    pub fn advance(&mut self, next: PageStage) -> Result<PipelineState> {
        let legal = match self.stage {
            None => next == PageStage::Rendering,
            Some(current) => current.can_advance_to(next),
        };
        if !legal {
            return Err(ScanlayerError::Internal(format!(
                "page {}: illegal transition {:?} -> {next}",
                self.index + 1,
                self.stage
            )));
        }
        self.stage = Some(next);
        Ok(PipelineState::Page {
            index: self.index,
            stage: next,
        })
    }
}

/// Tracks the run-level state.
#[derive(Debug)]
pub struct RunMachine {
    state: PipelineState,
}

impl Default for RunMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to `next`. Terminal states are final; `Failed` is always allowed
    /// from a non-terminal state.
    pub fn advance(&mut self, next: PipelineState) -> Result<PipelineState> {
        use PipelineState::*;
        let legal = match (self.state, next) {
            (current, _) if current.is_terminal() => false,
            (_, Failed) => true,
            (Idle, Page { .. }) | (Idle, Finalizing) => true,
            (Page { .. }, Page { .. }) | (Page { .. }, Finalizing) => true,
            (Finalizing, Done) => true,
            _ => false,
        };
        if !legal {
            return Err(ScanlayerError::Internal(format!(
                "illegal pipeline transition {} -> {next}",
                self.state
            )));
        }
        self.state = next;
        Ok(next)
    }
}
