//! LoadTester -- the owned handle a presentation layer drives.
//!
//! Holds at most one run. Starting or clearing discards the previous run:
//! its aggregator is aborted, so attempts still in flight from that run
//! deliver into a closed channel and cannot touch the new state.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{Aggregator, RunState};
use crate::artifact::Artifact;
use crate::dispatch::{Dispatcher, Uploader};
use crate::model::{Outcome, RunSnapshot, Summary};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadTestError {
    #[error("request count must be at least 1")]
    ZeroRequests,

    #[error("a run is already in progress")]
    RunInProgress,
}

struct ActiveRun {
    id: Uuid,
    view: watch::Receiver<RunState>,
    stop: CancellationToken,
    aggregator: JoinHandle<()>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.aggregator.abort();
    }
}

pub struct LoadTester {
    dispatcher: Dispatcher,
    run: Option<ActiveRun>,
}

impl LoadTester {
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        Self {
            dispatcher: Dispatcher::new(uploader),
            run: None,
        }
    }

    /// Start a run of `n` attempts, replacing any previous run.
    ///
    /// All attempts are scheduled before this returns.
    pub fn start(&mut self, artifact: Artifact, n: u32) -> Result<Uuid, LoadTestError> {
        if n == 0 {
            return Err(LoadTestError::ZeroRequests);
        }
        self.clear();

        let id = Uuid::new_v4();
        let (aggregator, sink, view) = Aggregator::new(id, n);
        let aggregator = aggregator.spawn();
        let stop = CancellationToken::new();

        info!(
            run_id = %id,
            total = n,
            artifact = %artifact.file_name,
            bytes = artifact.len(),
            "run started"
        );
        let attempts = self.dispatcher.dispatch(artifact, n, sink, &stop);
        info!(run_id = %id, scheduled = attempts.len(), "attempts dispatched");

        self.run = Some(ActiveRun {
            id,
            view,
            stop,
            aggregator,
        });
        Ok(id)
    }

    /// Like [`start`](Self::start) but refuses while a run is still in progress.
    pub fn try_start(&mut self, artifact: Artifact, n: u32) -> Result<Uuid, LoadTestError> {
        if self.is_running() {
            return Err(LoadTestError::RunInProgress);
        }
        self.start(artifact, n)
    }

    /// True while a run exists, has not reached `completed = total` and
    /// has not been stopped. A stopped run keeps its in-flight attempts and
    /// its live view, but no longer blocks clearing or a new start.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|r| {
            !r.stop.is_cancelled() && !r.view.borrow().summary().is_finished()
        })
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run.as_ref().map(|r| r.id)
    }

    pub fn summary(&self) -> Summary {
        match &self.run {
            Some(r) => r.view.borrow().summary().clone(),
            None => Summary::default(),
        }
    }

    /// Outcomes observed so far, sorted by dispatch id.
    pub fn outcomes(&self) -> Vec<Outcome> {
        match &self.run {
            Some(r) => r.view.borrow().sorted_outcomes(),
            None => Vec::new(),
        }
    }

    /// Summary, derived views and outcomes taken under a single read.
    pub fn snapshot(&self) -> RunSnapshot {
        match &self.run {
            Some(r) => r.view.borrow().snapshot(),
            None => RunState::empty().snapshot(),
        }
    }

    /// Live view of the current run for callers that want change notifications.
    pub fn subscribe(&self) -> Option<watch::Receiver<RunState>> {
        self.run.as_ref().map(|r| r.view.clone())
    }

    /// Request a stop. Only attempts not yet scheduled are affected; with
    /// eager scheduling that means in-flight attempts keep running and keep
    /// reporting into the live view. The run stops counting as in progress.
    /// Returns false when there is no run.
    pub fn stop(&self) -> bool {
        match &self.run {
            Some(r) => {
                r.stop.cancel();
                info!(run_id = %r.id, "stop requested; in-flight attempts are not aborted");
                true
            }
            None => false,
        }
    }

    /// Discard the current run, returning to an empty view.
    pub fn clear(&mut self) {
        if let Some(run) = self.run.take() {
            info!(run_id = %run.id, "run discarded");
        }
    }

    /// Wait until the current run finishes. Returns false if there is no
    /// run or it was discarded first.
    pub async fn wait_finished(&self) -> bool {
        let Some(mut view) = self.subscribe() else {
            return false;
        };
        let finished = view.wait_for(|s| s.summary().is_finished()).await.is_ok();
        finished
    }
}
