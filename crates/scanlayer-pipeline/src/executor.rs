// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Execution strategies for the per-page map.
//
// Page work is blocking (rasterizing, spawning the OCR engine), so each page
// runs on tokio's blocking pool. `Sequential` keeps one page in flight,
// `Bounded(k)` at most k. Either way outputs are delivered in page order,
// and cancellation is checked before a page starts.
//
// A page holds its permit until it has been delivered, so a page that
// finished ahead of an earlier one counts against the limit. At most k page
// outputs exist at any time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use scanlayer_core::error::{Result, ScanlayerError};

/// Cooperative cancellation flag, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested; stopping after pages in flight");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How many pages may be processed at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Bounded(usize),
}

impl ExecutionStrategy {
    /// `Sequential` for one worker, `Bounded(n)` otherwise.
    pub fn from_workers(workers: usize) -> Self {
        if workers <= 1 {
            Self::Sequential
        } else {
            Self::Bounded(workers)
        }
    }

    pub fn max_in_flight(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Bounded(k) => (*k).max(1),
        }
    }

    /// Run `work` for every page index in `0..total` and hand each output
    /// to `deliver` in index order, as soon as every earlier page has been
    /// delivered.
    ///
    /// The first `Err`, from `work` or from `deliver`, stops the run: pages
    /// not yet started are skipped, pages in flight are awaited and
    /// discarded. Cancellation yields `Cancelled` with the number of pages
    /// that had completed.
    pub async fn run<T, F, D>(&self, total: usize, cancel: &CancelToken, work: F, mut deliver: D) -> Result<()>
    where
        T: Send + 'static,
        F: Fn(usize) -> Result<T> + Send + Sync + 'static,
        D: FnMut(usize, T) -> Result<()>,
    {
        let work = Arc::new(work);
        let permits = Arc::new(Semaphore::new(self.max_in_flight()));
        // A page's permit comes back with its output and is released only
        // once the output is delivered, so a failure is seen before the next
        // page can start.
        let mut tasks: JoinSet<Joined<T>> = JoinSet::new();
        let mut order = InOrder::new();
        let mut failure: Option<ScanlayerError> = None;

        debug!(total, in_flight = self.max_in_flight(), "Dispatching pages");

        for index in 0..total {
            // Wait for a free slot, harvesting finished pages meanwhile.
            let permit = loop {
                if let Ok(permit) = permits.clone().try_acquire_owned() {
                    break Some(permit);
                }
                match tasks.join_next().await {
                    Some(joined) => order.record(joined, &mut deliver, &mut failure),
                    None => break permits.clone().acquire_owned().await.ok(),
                }
            };
            if failure.is_some() || cancel.is_cancelled() {
                break;
            }
            let Some(permit) = permit else {
                failure = Some(ScanlayerError::Internal("worker pool closed".into()));
                break;
            };

            let work = Arc::clone(&work);
            tasks.spawn_blocking(move || (index, work(index), permit));
        }

        while let Some(joined) = tasks.join_next().await {
            order.record(joined, &mut deliver, &mut failure);
        }

        if let Some(err) = failure {
            return Err(err);
        }
        let completed = order.completed;
        if cancel.is_cancelled() && completed < total {
            warn!(completed, total, "Run cancelled");
            return Err(ScanlayerError::Cancelled { completed, total });
        }
        if order.next < total {
            return Err(ScanlayerError::Internal(format!("page {} produced no output", order.next + 1)));
        }
        Ok(())
    }
}

type Joined<T> = (usize, Result<T>, OwnedSemaphorePermit);

/// Reorders page outputs. Outputs that finished ahead of an earlier page
/// wait here together with their permits.
struct InOrder<T> {
    next: usize,
    completed: usize,
    waiting: BTreeMap<usize, (T, OwnedSemaphorePermit)>,
}

impl<T> InOrder<T> {
    fn new() -> Self {
        Self {
            next: 0,
            completed: 0,
            waiting: BTreeMap::new(),
        }
    }

    fn record<D>(
        &mut self,
        joined: std::result::Result<Joined<T>, tokio::task::JoinError>,
        deliver: &mut D,
        failure: &mut Option<ScanlayerError>,
    ) where
        D: FnMut(usize, T) -> Result<()>,
    {
        let err = match joined {
            Ok((index, Ok(output), permit)) => {
                self.completed += 1;
                if failure.is_some() {
                    return;
                }
                self.waiting.insert(index, (output, permit));
                match self.flush(deliver) {
                    Ok(()) => return,
                    Err(err) => err,
                }
            }
            Ok((_, Err(err), _permit)) => err,
            Err(join_err) => ScanlayerError::Internal(format!("page worker panicked: {join_err}")),
        };
        // Keep the first error; later ones are consequences.
        failure.get_or_insert(err);
        self.waiting.clear();
    }

    fn flush<D>(&mut self, deliver: &mut D) -> Result<()>
    where
        D: FnMut(usize, T) -> Result<()>,
    {
        while let Some((output, _permit)) = self.waiting.remove(&self.next) {
            deliver(self.next, output)?;
            self.next += 1;
        }
        Ok(())
    }
}
