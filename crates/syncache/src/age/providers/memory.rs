//! # Memory Age Store
//!
//! In-process store for fetch stamps and force flags. Not durable across
//! restarts; primarily useful for tests and for hosts that already persist
//! elsewhere.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::age::store::{AgeStore, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryAgeStore {
    stamps: RwLock<HashMap<String, i64>>,
    flags: RwLock<HashSet<String>>,
}

impl MemoryAgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgeStore for MemoryAgeStore {
    async fn load_timestamp(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.stamps.read().get(key).copied())
    }

    async fn store_timestamp(&self, key: &str, epoch_millis: i64) -> StoreResult<()> {
        self.stamps.write().insert(key.to_owned(), epoch_millis);
        Ok(())
    }

    async fn set_flag(&self, key: &str) -> StoreResult<()> {
        self.flags.write().insert(key.to_owned());
        Ok(())
    }

    async fn take_flag(&self, key: &str) -> StoreResult<bool> {
        Ok(self.flags.write().remove(key))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.stamps.write().remove(key);
        self.flags.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.stamps.write().clear();
        self.flags.write().clear();
        Ok(())
    }
}
