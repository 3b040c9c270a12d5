//! Outcome and Summary records shared by the dispatcher and the aggregator.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => f.pad("success"),
            OutcomeStatus::Error => f.pad("error"),
        }
    }
}

/// The normalized result of one attempt.
///
/// Exactly one of `error` / `payload` is populated, selected by `status`.
/// Build through [`Outcome::success`] or [`Outcome::failure`] to keep that
/// pairing intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Dispatch-order identifier in `1..=n`.
    pub id: u32,
    pub status: OutcomeStatus,
    /// Wall-clock time between attempt start and settlement.
    pub duration_ms: u64,
    /// Local completion time, `HH:MM:SS`.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Outcome {
    pub fn success(id: u32, duration_ms: u64, payload: serde_json::Value) -> Self {
        Self {
            id,
            status: OutcomeStatus::Success,
            duration_ms,
            timestamp: completion_timestamp(),
            error: None,
            payload: Some(payload),
        }
    }

    pub fn failure(id: u32, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            status: OutcomeStatus::Error,
            duration_ms,
            timestamp: completion_timestamp(),
            error: Some(error.into()),
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Read a named top-level field from the success payload, if any.
    pub fn payload_field(&self, name: &str) -> Option<&serde_json::Value> {
        self.payload.as_ref().and_then(|p| p.get(name))
    }
}

/// Aggregate counters and timing for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: u32,
    pub completed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Summary {
    /// A fresh summary for a run of `total` attempts starting now.
    pub fn start(total: u32) -> Self {
        Self {
            total,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// `finished_at - started_at` in milliseconds, 0 while the run is incomplete.
    pub fn total_elapsed_ms(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => elapsed_ms(start, end),
            _ => 0,
        }
    }

    /// `completed / total`, 0.0 for an empty run.
    pub fn completion_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.completed) / f64::from(self.total)
    }
}

/// A consistent read of a run: summary, derived views and outcomes sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub summary: Summary,
    pub total_elapsed_ms: u64,
    pub average_duration_ms: u64,
    pub completion_fraction: f64,
    pub outcomes: Vec<Outcome>,
}

/// Mean of `duration_ms`, rounded half up. 0 when `outcomes` is empty.
pub fn average_duration_ms(outcomes: &[Outcome]) -> u64 {
    if outcomes.is_empty() {
        return 0;
    }
    let total: u64 = outcomes.iter().map(|o| o.duration_ms).sum();
    let count = outcomes.len() as u64;
    (total * 2 + count) / (count * 2)
}

/// Milliseconds between two instants, clamped at zero.
pub fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

fn completion_timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
