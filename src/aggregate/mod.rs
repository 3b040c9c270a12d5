//! Run aggregation.
//!
//! A single owner task drains the Outcome channel and applies each arrival
//! to the [`RunState`] through `watch::Sender::send_modify`. Updates are
//! therefore serialized without locks on the write path, and every reader
//! sees the state either before or after a whole arrival (appended outcome
//! and counters together), never in between.

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{average_duration_ms, Outcome, OutcomeStatus, RunSnapshot, Summary};

/// Summary plus every Outcome observed so far, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    summary: Summary,
    outcomes: Vec<Outcome>,
}

impl RunState {
    /// State for a run of `total` attempts, started now.
    pub fn new(total: u32) -> Self {
        Self {
            summary: Summary::start(total),
            outcomes: Vec::with_capacity(total as usize),
        }
    }

    /// State with nothing started, as shown after a reset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record one arrival. Returns `true` when this arrival completed the run.
    ///
    /// Arrivals past `total` or with an id already seen are dropped so a
    /// misbehaving producer cannot double count.
    pub fn apply(&mut self, outcome: Outcome) -> bool {
        if self.summary.completed >= self.summary.total {
            warn!(attempt = outcome.id, "outcome arrived after run completed, ignoring");
            return false;
        }
        if self.outcomes.iter().any(|o| o.id == outcome.id) {
            warn!(attempt = outcome.id, "duplicate outcome, ignoring");
            return false;
        }

        self.summary.completed += 1;
        match outcome.status {
            OutcomeStatus::Success => self.summary.succeeded += 1,
            OutcomeStatus::Error => self.summary.failed += 1,
        }
        self.outcomes.push(outcome);

        if self.summary.completed == self.summary.total {
            self.summary.finished_at = Some(Utc::now());
            return true;
        }
        false
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Outcomes in the order they arrived.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Outcomes ordered by dispatch id, for display.
    pub fn sorted_outcomes(&self) -> Vec<Outcome> {
        let mut sorted = self.outcomes.clone();
        sorted.sort_by_key(|o| o.id);
        sorted
    }

    pub fn average_duration_ms(&self) -> u64 {
        average_duration_ms(&self.outcomes)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            summary: self.summary.clone(),
            total_elapsed_ms: self.summary.total_elapsed_ms(),
            average_duration_ms: self.average_duration_ms(),
            completion_fraction: self.summary.completion_fraction(),
            outcomes: self.sorted_outcomes(),
        }
    }
}

/// Exclusive owner of one run's state.
pub struct Aggregator {
    run_id: Uuid,
    rx: mpsc::UnboundedReceiver<Outcome>,
    state: watch::Sender<RunState>,
}

impl Aggregator {
    /// Create the aggregator for a run of `total` attempts, returning the
    /// sink producers send Outcomes into and a receiver for live reads.
    pub fn new(
        run_id: Uuid,
        total: u32,
    ) -> (Self, mpsc::UnboundedSender<Outcome>, watch::Receiver<RunState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, view) = watch::channel(RunState::new(total));
        (Self { run_id, rx, state }, tx, view)
    }

    /// Apply arrivals until every producer has dropped its sink.
    pub async fn run(mut self) {
        while let Some(outcome) = self.rx.recv().await {
            let id = outcome.id;
            let status = outcome.status;
            let duration_ms = outcome.duration_ms;

            let mut finished = false;
            self.state.send_modify(|state| finished = state.apply(outcome));

            debug!(run_id = %self.run_id, attempt = id, %status, duration_ms, "outcome recorded");

            if finished {
                let summary = self.state.borrow().summary().clone();
                info!(
                    run_id = %self.run_id,
                    total = summary.total,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    elapsed_ms = summary.total_elapsed_ms(),
                    "run finished"
                );
            }
        }
        debug!(run_id = %self.run_id, "aggregator drained");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn ok(id: u32, ms: u64) -> Outcome {
        Outcome::success(id, ms, json!({"fatura_no": format!("F{}", id)}))
    }

    fn err(id: u32, ms: u64) -> Outcome {
        Outcome::failure(id, ms, "overloaded")
    }

    #[test]
    fn test_apply_counts_and_finishes_once() {
        let mut state = RunState::new(3);
        assert!(!state.apply(ok(2, 100)));
        assert!(!state.apply(err(3, 50)));
        assert!(state.summary().finished_at.is_none());

        assert!(state.apply(ok(1, 30)));
        let finished_at = state.summary().finished_at;
        assert!(finished_at.is_some());

        let s = state.summary();
        assert_eq!((s.total, s.completed, s.succeeded, s.failed), (3, 3, 2, 1));

        // Over-delivery changes nothing, including finished_at.
        assert!(!state.apply(ok(4, 10)));
        assert_eq!(state.summary().completed, 3);
        assert_eq!(state.summary().finished_at, finished_at);
    }

    #[test]
    fn test_duplicate_id_ignored() {
        let mut state = RunState::new(3);
        state.apply(ok(1, 10));
        state.apply(err(1, 10));
        assert_eq!(state.summary().completed, 1);
        assert_eq!(state.summary().failed, 0);
        assert_eq!(state.outcomes().len(), 1);
    }

    #[test]
    fn test_counters_monotonic_and_conserved() {
        let mut state = RunState::new(6);
        let mut prev = state.summary().clone();
        for (i, o) in [ok(4, 1), err(1, 1), ok(6, 1), err(2, 1), ok(3, 1), ok(5, 1)]
            .into_iter()
            .enumerate()
        {
            state.apply(o);
            let s = state.summary();
            assert!(s.completed >= prev.completed);
            assert!(s.succeeded >= prev.succeeded);
            assert!(s.failed >= prev.failed);
            assert_eq!(s.completed, s.succeeded + s.failed);
            assert_eq!(s.completed as usize, i + 1);
            assert_eq!(state.outcomes().len(), s.completed as usize);
            prev = s.clone();
        }
    }

    #[test]
    fn test_sorted_by_dispatch_id_not_arrival() {
        let mut state = RunState::new(3);
        state.apply(ok(3, 1));
        state.apply(ok(1, 1));
        state.apply(ok(2, 1));

        let arrival: Vec<u32> = state.outcomes().iter().map(|o| o.id).collect();
        assert_eq!(arrival, vec![3, 1, 2]);
        let sorted: Vec<u32> = state.sorted_outcomes().iter().map(|o| o.id).collect();
        assert_eq!(sorted, vec![1, 2, 3]);
    }

    #[test]
    fn test_snapshot_derived_views() {
        let mut state = RunState::new(4);
        let snap = state.snapshot();
        assert_eq!(snap.average_duration_ms, 0);
        assert_eq!(snap.total_elapsed_ms, 0);

        state.apply(ok(1, 100));
        state.apply(err(2, 201));
        let snap = state.snapshot();
        assert_eq!(snap.average_duration_ms, 151);
        assert_eq!(snap.completion_fraction, 0.5);
        assert_eq!(snap.total_elapsed_ms, 0);

        // Reading twice without an arrival is identical.
        assert_eq!(state.snapshot(), snap);
    }

    #[test]
    fn test_empty_state() {
        let state = RunState::empty();
        assert_eq!(state.summary(), &Summary::default());
        assert!(state.outcomes().is_empty());
    }

    #[tokio::test]
    async fn test_simultaneous_arrivals_lose_nothing() {
        let (aggregator, sink, mut view) = Aggregator::new(Uuid::new_v4(), 10);
        let handle = aggregator.spawn();

        let barrier = Arc::new(Barrier::new(10));
        for id in 1..=10u32 {
            let sink = sink.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                let outcome = if id % 2 == 0 { ok(id, 5) } else { err(id, 5) };
                sink.send(outcome).unwrap();
            });
        }
        drop(sink);

        let state = view
            .wait_for(|s| s.summary().is_finished())
            .await
            .unwrap()
            .clone();
        let s = state.summary();
        assert_eq!((s.completed, s.succeeded, s.failed), (10, 5, 5));
        assert_eq!(state.outcomes().len(), 10);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_readers_never_see_torn_update() {
        let (aggregator, sink, view) = Aggregator::new(Uuid::new_v4(), 200);
        let handle = aggregator.spawn();

        let reader = tokio::spawn({
            let mut view = view.clone();
            async move {
                loop {
                    {
                        let state = view.borrow_and_update();
                        let s = state.summary();
                        assert_eq!(s.completed as usize, state.outcomes().len());
                        assert_eq!(s.completed, s.succeeded + s.failed);
                        if s.is_finished() {
                            break;
                        }
                    }
                    if view.changed().await.is_err() {
                        break;
                    }
                }
            }
        });

        for id in 1..=200u32 {
            let sink = sink.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                sink.send(ok(id, 1)).unwrap();
            });
        }
        drop(sink);

        reader.await.unwrap();
        handle.await.unwrap();
        assert_eq!(view.borrow().summary().completed, 200);
    }
}
