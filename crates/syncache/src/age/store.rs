//! # Age Store
//!
//! This module defines the key-value store trait the age tracker delegates
//! its persistence to. Any durable store keyed by string can back it; the
//! trait is also the injection seam tests use to seed tracker state.

use async_trait::async_trait;

/// Result of an age-store operation.
pub type StoreResult<T> = std::result::Result<T, std::io::Error>;

/// A durable key-value store for fetch stamps and force flags.
#[async_trait]
pub trait AgeStore: Send + Sync {
    /// Load a stored timestamp in epoch milliseconds.
    async fn load_timestamp(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Store a timestamp, overwriting any previous value.
    async fn store_timestamp(&self, key: &str, epoch_millis: i64) -> StoreResult<()>;

    /// Set a flag.
    async fn set_flag(&self, key: &str) -> StoreResult<()>;

    /// Read and atomically clear a flag, returning whether it was set.
    async fn take_flag(&self, key: &str) -> StoreResult<bool>;

    /// Remove a single key of either kind.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Remove every entry in the store.
    async fn clear(&self) -> StoreResult<()>;
}
