//! Attempt dispatch: fires N concurrent upload attempts and normalizes each
//! one into an [`Outcome`].
//!
//! Every failure mode (transport, non-2xx status, undecodable body, even a
//! panicking uploader) is converted to an `error` Outcome inside the attempt.
//! Nothing escapes this boundary except Outcomes.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::model::Outcome;

pub mod http;

/// Why a single attempt did not produce a payload.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Connection refused, DNS failure, reset, timeout.
    #[error("{0}")]
    Transport(String),

    /// A response arrived with a non-2xx status.
    #[error("{}", status_message(.status, .body))]
    Status { status: u16, body: String },

    /// 2xx response whose body is not valid JSON.
    #[error("{0}")]
    Decode(String),
}

fn status_message(status: &u16, body: &str) -> String {
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.to_string()
    }
}

/// One request/response cycle against the upload endpoint.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    /// Send `artifact` once and return the decoded response body.
    async fn upload(&self, artifact: &Artifact) -> Result<serde_json::Value, AttemptError>;
}

/// Schedules attempts onto the tokio runtime.
#[derive(Clone)]
pub struct Dispatcher {
    uploader: Arc<dyn Uploader>,
}

/// Handles to the attempts scheduled by one [`Dispatcher::dispatch`] call.
pub struct Attempts {
    handles: Vec<JoinHandle<()>>,
}

impl Attempts {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Dispatcher {
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        Self { uploader }
    }

    /// Start attempts `1..=n` immediately, each sending its Outcome into `sink`.
    ///
    /// No client-side concurrency ceiling is applied. `stop` is consulted only
    /// before scheduling each attempt; attempts already running are never
    /// aborted, and since scheduling is eager a stop issued after this call
    /// returns changes nothing.
    pub fn dispatch(
        &self,
        artifact: Artifact,
        n: u32,
        sink: mpsc::UnboundedSender<Outcome>,
        stop: &CancellationToken,
    ) -> Attempts {
        let mut handles = Vec::with_capacity(n as usize);

        for id in 1..=n {
            if stop.is_cancelled() {
                info!(scheduled = id - 1, total = n, "stop requested, remaining attempts not scheduled");
                break;
            }

            let uploader = Arc::clone(&self.uploader);
            let artifact = artifact.clone();
            let sink = sink.clone();

            handles.push(tokio::spawn(async move {
                let outcome = run_attempt(uploader.as_ref(), &artifact, id).await;
                if sink.send(outcome).is_err() {
                    debug!(attempt = id, "run discarded before attempt settled");
                }
            }));
        }

        debug!(attempts = handles.len(), "attempts scheduled");
        Attempts { handles }
    }
}

/// Run one attempt and classify its result.
pub async fn run_attempt(uploader: &dyn Uploader, artifact: &Artifact, id: u32) -> Outcome {
    let start = Instant::now();
    let result = AssertUnwindSafe(uploader.upload(artifact)).catch_unwind().await;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(Ok(payload)) => Outcome::success(id, duration_ms, payload),
        Ok(Err(e)) => {
            debug!(attempt = id, duration_ms, error = %e, "attempt failed");
            Outcome::failure(id, duration_ms, e.to_string())
        }
        Err(panic) => {
            warn!(attempt = id, "uploader panicked");
            Outcome::failure(
                id,
                duration_ms,
                format!("attempt panicked: {}", panic_message(panic.as_ref())),
            )
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
