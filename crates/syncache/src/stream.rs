//! # Cache State Stream
//!
//! Replay-latest, multi-subscriber fan-out over [`CacheState`] values.
//!
//! Every mutation is computed from the immediately preceding state plus one
//! new fact, inside the watch channel's own serialized mutation closure, so
//! two orthogonal facts arriving close together are both retained in the
//! merged state instead of one overwriting the other. Publishes are stamped
//! with the binding epoch they were minted under; a publish from a pipeline
//! that has since been torn down is dropped inside the same closure, which
//! makes "no late events from a dead pipeline" deterministic rather than a
//! race.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::CacheState;

/// Compounding state holder with replay-latest subscription semantics.
pub struct CacheStateStream<T> {
    tx: watch::Sender<CacheState<T>>,
    epoch: AtomicU64,
}

impl<T> Default for CacheStateStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheStateStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a stream holding the initial [`CacheState::Unbound`] state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CacheState::Unbound);
        Self {
            tx,
            epoch: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> CacheState<T> {
        self.tx.borrow().clone()
    }

    /// Subscribe as a raw watch receiver. The receiver observes the current
    /// state immediately and every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<CacheState<T>> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`. The first item is the current state.
    pub fn stream(&self) -> WatchStream<CacheState<T>> {
        WatchStream::new(self.tx.subscribe())
    }

    /// The current binding epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Start a new binding epoch, invalidating every publish minted under a
    /// previous one. Goes through the channel's mutation lock so the bump is
    /// totally ordered with in-flight applies.
    pub fn advance_epoch(&self) -> u64 {
        let mut next = 0;
        self.tx.send_if_modified(|_| {
            next = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
            false
        });
        next
    }

    /// Replace the state outright. Used for the first publish of a fresh
    /// binding, which must not compound over the previous binding's state.
    pub fn publish(&self, epoch: u64, state: CacheState<T>) -> bool {
        self.apply(epoch, move |_| state)
    }

    /// Compound one fact over the immediately preceding state. Returns false
    /// if the publish was dropped because `epoch` is no longer current.
    pub fn apply(&self, epoch: u64, fact: impl FnOnce(CacheState<T>) -> CacheState<T>) -> bool {
        self.tx.send_if_modified(|state| {
            if self.epoch.load(Ordering::Acquire) != epoch {
                return false;
            }
            *state = fact(state.clone());
            true
        })
    }
}
