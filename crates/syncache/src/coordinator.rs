//! # Refresh Coordinator
//!
//! Single-flight execution of refresh tasks keyed by tag. While a refresh is
//! in flight for a tag, further callers attach to it instead of spawning a
//! second one; the task runs exactly once and every attached caller receives
//! the identical outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::source::Tag;

/// Outcome of a refresh request.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The fetched payload was persisted and stamped.
    Completed,
    /// The attempt failed; cached data is untouched.
    Failed(EngineError),
    /// No attempt was made.
    Skipped(SkipReason),
}

/// Why a refresh request made no attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoRequirementsBound,
    NotDueYet,
}

impl RefreshOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Fail-fast view: `Ok(true)` if a refresh completed, `Ok(false)` if it
    /// was not due, `Err` otherwise.
    pub fn into_result(self) -> Result<bool, EngineError> {
        match self {
            Self::Completed => Ok(true),
            Self::Skipped(SkipReason::NotDueYet) => Ok(false),
            Self::Skipped(SkipReason::NoRequirementsBound) => {
                Err(EngineError::NoRequirementsBound)
            }
            Self::Failed(error) => Err(error),
        }
    }
}

type Waiters = Vec<oneshot::Sender<RefreshOutcome>>;

/// Single-flight refresh executor, shareable across engines.
///
/// Engines that must share dedup scope are handed clones of the same
/// coordinator; there is no ambient global instance.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    in_flight: Arc<Mutex<HashMap<Tag, Waiters>>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` for `tag`, or attach to the refresh already in flight for
    /// it. The task always executes on a spawned worker, never on the
    /// caller's thread; completion is delivered on an unspecified worker
    /// context and re-synchronizing is the caller's responsibility.
    pub async fn refresh<F, Fut>(&self, tag: &Tag, task: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let leads = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get_mut(tag) {
                Some(waiters) => {
                    waiters.push(result_tx);
                    false
                }
                None => {
                    in_flight.insert(tag.clone(), vec![result_tx]);
                    true
                }
            }
        };

        if leads {
            let worker = tokio::spawn(task());
            let in_flight = Arc::clone(&self.in_flight);
            let tag = tag.clone();
            // Detached driver: resolves waiters even if the leading caller
            // goes away mid-flight.
            tokio::spawn(async move {
                let outcome = match worker.await {
                    Ok(Ok(())) => RefreshOutcome::Completed,
                    Ok(Err(error)) => RefreshOutcome::Failed(error),
                    Err(join_error) => {
                        warn!(tag = %tag, error = %join_error, "refresh worker vanished");
                        RefreshOutcome::Failed(EngineError::RefreshAborted)
                    }
                };

                // Removing the entry before notifying lets a new refresh for
                // this tag start immediately; notification happens with the
                // lock released.
                let waiters = in_flight.lock().remove(&tag).unwrap_or_default();
                debug!(tag = %tag, waiters = waiters.len(), "refresh resolved");
                for waiter in waiters {
                    let _ = waiter.send(outcome.clone());
                }
            });
        } else {
            debug!(tag = %tag, "attached to in-flight refresh");
        }

        match result_rx.await {
            Ok(outcome) => outcome,
            Err(_) => RefreshOutcome::Failed(EngineError::RefreshAborted),
        }
    }

    /// Whether a refresh is currently in flight for `tag`.
    pub fn is_in_flight(&self, tag: &Tag) -> bool {
        self.in_flight.lock().contains_key(tag)
    }
}
