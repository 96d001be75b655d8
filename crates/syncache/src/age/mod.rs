//! # Cache Age Tracking
//!
//! This module decides staleness. It persists the time of the last
//! successful fetch per tag, answers the staleness predicate against an age
//! threshold, and holds the one-shot force-refresh flag. No network or
//! blocking I/O; persistence is delegated to any [`AgeStore`].

pub mod providers;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::config::AgeThreshold;
use crate::source::Tag;

pub use providers::{FileAgeStore, MemoryAgeStore};
pub use store::{AgeStore, StoreResult};

/// Default namespace prefix for persisted keys, keeping them clear of
/// unrelated entries in a shared host store.
pub const DEFAULT_KEY_PREFIX: &str = "syncache";

/// Per-tag bookkeeping of fetch recency and forced-refresh intent.
///
/// Engines that must agree on staleness share one tracker handle; there is
/// no ambient global instance.
pub struct CacheAgeTracker {
    store: Arc<dyn AgeStore>,
    prefix: String,
}

impl CacheAgeTracker {
    /// Create a tracker over `store` with the default key prefix.
    pub fn new(store: Arc<dyn AgeStore>) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    /// Create a tracker over `store` with a custom key prefix.
    pub fn with_prefix(store: Arc<dyn AgeStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn stamp_key(&self, tag: &Tag) -> String {
        format!("{}:fetched-at:{}", self.prefix, tag)
    }

    fn force_key(&self, tag: &Tag) -> String {
        format!("{}:force:{}", self.prefix, tag)
    }

    /// When the last successful fetch for `tag` completed, if one ever did.
    pub async fn last_successful_fetch(&self, tag: &Tag) -> StoreResult<Option<DateTime<Utc>>> {
        let millis = self.store.load_timestamp(&self.stamp_key(tag)).await?;
        Ok(millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    /// Record a successful fetch. Overwrite semantics: last write wins.
    pub async fn update_last_successful_fetch(
        &self,
        tag: &Tag,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        debug!(tag = %tag, at = %at, "recording successful fetch");
        self.store
            .store_timestamp(&self.stamp_key(tag), at.timestamp_millis())
            .await
    }

    /// Whether the cache for `tag` is stale against `threshold` right now.
    pub async fn is_stale(&self, tag: &Tag, threshold: &AgeThreshold) -> StoreResult<bool> {
        let last = self.last_successful_fetch(tag).await?;
        Ok(Self::is_stale_at(last, threshold, Utc::now()))
    }

    /// Pure staleness predicate: true if no fetch ever succeeded or the age
    /// at `now` has reached the threshold.
    pub fn is_stale_at(
        last: Option<DateTime<Utc>>,
        threshold: &AgeThreshold,
        now: DateTime<Utc>,
    ) -> bool {
        match last {
            None => true,
            Some(at) => now.signed_duration_since(at).num_milliseconds() >= threshold.as_millis(),
        }
    }

    /// Request that the next staleness consult for `tag` forces a refresh.
    pub async fn mark_force_next_fetch(&self, tag: &Tag) -> StoreResult<()> {
        self.store.set_flag(&self.force_key(tag)).await
    }

    /// Read and atomically clear the force flag for `tag`.
    pub async fn consume_force_next_fetch(&self, tag: &Tag) -> StoreResult<bool> {
        let forced = self.store.take_flag(&self.force_key(tag)).await?;
        if forced {
            debug!(tag = %tag, "consumed force-refresh flag");
        }
        Ok(forced)
    }

    /// Drop all bookkeeping for `tag`.
    pub async fn forget(&self, tag: &Tag) -> StoreResult<()> {
        self.store.remove(&self.stamp_key(tag)).await?;
        self.store.remove(&self.force_key(tag)).await
    }
}
