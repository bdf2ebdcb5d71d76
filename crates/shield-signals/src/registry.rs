//! # Signal Registry
//!
//! Owns the detection signals and runs them for each request: concurrent
//! fan-out, per-signal deadlines, and hard failure isolation.
//!
//! ## Isolation contract
//!
//! One signal must never take the others down. Every signal call is
//! dispatched on its own blocking task and every failure mode degrades to a
//! zero-score result instead of propagating:
//!
//! | Failure | Result |
//! |------------------------|--------------------------------------------|
//! | Signal returns `Err` | `available: true`, score 0, warn logged |
//! | Signal panics | `available: true`, score 0, warn logged |
//! | Deadline exceeded | `available: true`, score 0, warn logged |
//! | Permanently unavailable| `available: false` placeholder, no dispatch|
//!
//! There is no request-level abort: the caller joins on every signal's
//! result (or its degraded stand-in). Deadlines are measured from dispatch.
//! A timed-out task is abandoned, which is safe because signals hold no
//! mutable shared state - model artifacts and rule tables are immutable
//! after their single-flight initialization.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout_at;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{SignalKind, SignalOutcome, SignalResult};

/// One independent analysis method.
///
/// Implementations are synchronous and CPU-bound; the registry provides
/// concurrency, deadlines, and panic isolation around them. They must be
/// safe to share across requests (`Send + Sync`) and hold no per-request
/// state.
pub trait Signal: Send + Sync + 'static {
    /// Which signal this is.
    fn kind(&self) -> SignalKind;

    /// Current availability.
    ///
    /// Tri-state lifecycle for optional signals: uninitialized counts as
    /// available (the first call attempts the load), a failed load flips
    /// this to `false` for the process lifetime. Always-on signals keep the
    /// default.
    fn is_available(&self) -> bool {
        true
    }

    /// Analyzes the content, returning a score and flagged segments.
    ///
    /// Errors are converted to degraded results by the registry; they never
    /// reach the caller of [`SignalRegistry::run`].
    fn analyze(&self, content: &str) -> Result<SignalOutcome>;
}

/// Owns the signal instances and executes them per request.
pub struct SignalRegistry {
    signals: Vec<Arc<dyn Signal>>,
    timeout: Duration,
}

impl SignalRegistry {
    /// Creates an empty registry with the given per-signal deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            signals: Vec::new(),
            timeout,
        }
    }

    /// Registers a signal. Dispatch order follows registration order.
    pub fn register(&mut self, signal: Arc<dyn Signal>) {
        self.signals.push(signal);
    }

    /// Number of registered signals, available or not.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// True if no signals are registered.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Kinds of all currently available signals, in registration order.
    pub fn available_kinds(&self) -> Vec<SignalKind> {
        self.signals
            .iter()
            .filter(|s| s.is_available())
            .map(|s| s.kind())
            .collect()
    }

    /// Runs every available signal concurrently and joins on all of them.
    ///
    /// Returns one [`SignalResult`] per registered signal, in registration
    /// order; unavailable signals yield placeholder results so the caller's
    /// breakdown reflects them.
    pub async fn run(&self, content: &str) -> Vec<SignalResult> {
        let shared: Arc<str> = Arc::from(content);
        let mut pending = Vec::with_capacity(self.signals.len());

        for signal in &self.signals {
            let kind = signal.kind();
            if !signal.is_available() {
                debug!(signal = %kind, "skipping unavailable signal");
                pending.push((kind, None));
                continue;
            }
            let signal = Arc::clone(signal);
            let content = Arc::clone(&shared);
            let dispatched = Instant::now();
            let deadline = tokio::time::Instant::now() + self.timeout;
            let handle = tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                let outcome = signal.analyze(&content);
                (outcome, started.elapsed())
            });
            pending.push((kind, Some((dispatched, deadline, handle))));
        }

        let mut results = Vec::with_capacity(pending.len());
        for (kind, dispatch) in pending {
            let Some((dispatched, deadline, handle)) = dispatch else {
                results.push(SignalResult::unavailable(kind));
                continue;
            };
            let result = match timeout_at(deadline, handle).await {
                Ok(Ok((Ok(outcome), elapsed))) => {
                    debug!(signal = %kind, score = outcome.score, "signal completed");
                    SignalResult::from_outcome(kind, outcome, elapsed)
                }
                Ok(Ok((Err(e), elapsed))) => {
                    warn!(signal = %kind, error = %e, "signal failed; degrading to zero score");
                    SignalResult::degraded(kind, elapsed)
                }
                Ok(Err(join_error)) => {
                    warn!(signal = %kind, error = %join_error, "signal panicked; degrading to zero score");
                    SignalResult::degraded(kind, dispatched.elapsed())
                }
                Err(_) => {
                    warn!(signal = %kind, timeout_ms = self.timeout.as_millis() as u64, "signal deadline exceeded; degrading this call");
                    SignalResult::degraded(kind, dispatched.elapsed())
                }
            };
            results.push(result);
        }
        results
    }
}
