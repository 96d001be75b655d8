//! # File Age Store
//!
//! Durable file-backed store for fetch stamps and force flags. Each key maps
//! to one small JSON record named by the sha256 of the key; stamps and flags
//! live in separate subdirectories. Writes go through a temporary file plus
//! rename so a crash never leaves a half-written record behind.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::age::store::{AgeStore, StoreResult};

const STAMP_DIR: &str = "stamps";
const FLAG_DIR: &str = "flags";

/// One persisted fetch stamp. The original key is stored alongside the value
/// so records stay inspectable despite the hashed filenames.
#[derive(Debug, Serialize, Deserialize)]
struct StampRecord {
    key: String,
    epoch_millis: i64,
}

#[derive(Debug, Clone)]
pub struct FileAgeStore {
    root: PathBuf,
    initialized: Arc<AtomicBool>,
}

impl FileAgeStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// first use.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Initialize the store directories.
    async fn ensure_initialized(&self) -> io::Result<()> {
        // Fast path - already initialized
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(());
        }

        // Use compare_exchange to ensure only one task initializes
        if self
            .initialized
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            fs::create_dir_all(self.root.join(STAMP_DIR)).await?;
            fs::create_dir_all(self.root.join(FLAG_DIR)).await?;
            self.initialized.store(true, Ordering::Release);
        } else {
            // Another task is initializing, wait for it to complete
            while !self.initialized.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
        }

        Ok(())
    }

    /// Filename-safe digest of a key.
    fn filename(key: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(key);
        let hash = hasher.finalize();
        format!("{hash:x}")
    }

    fn stamp_path(&self, key: &str) -> PathBuf {
        self.root.join(STAMP_DIR).join(Self::filename(key))
    }

    fn flag_path(&self, key: &str) -> PathBuf {
        self.root.join(FLAG_DIR).join(Self::filename(key))
    }
}

#[async_trait]
impl AgeStore for FileAgeStore {
    async fn load_timestamp(&self, key: &str) -> StoreResult<Option<i64>> {
        self.ensure_initialized().await?;

        let path = self.stamp_path(key);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let contents = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read stamp record");
                return Err(e);
            }
        };

        match serde_json::from_slice::<StampRecord>(&contents) {
            Ok(record) => Ok(Some(record.epoch_millis)),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to parse stamp record; treating as absent");

                // Drop the corrupt record in the background so the next
                // lookup does not hit it again.
                let path = path.clone();
                tokio::spawn(async move {
                    let _ = fs::remove_file(&path).await;
                });

                Ok(None)
            }
        }
    }

    async fn store_timestamp(&self, key: &str, epoch_millis: i64) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let path = self.stamp_path(key);
        let record = StampRecord {
            key: key.to_owned(),
            epoch_millis,
        };
        let contents = serde_json::to_vec(&record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Write to a temporary file then rename so readers never observe a
        // partial record.
        let temp_path = path.with_extension("tmp");
        if let Err(e) = fs::write(&temp_path, &contents).await {
            warn!(path = ?temp_path, error = %e, "Failed to write stamp record");
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(from = ?temp_path, to = ?path, error = %e, "Failed to rename stamp record");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(key = key, epoch_millis = epoch_millis, "Stored fetch stamp");
        Ok(())
    }

    async fn set_flag(&self, key: &str) -> StoreResult<()> {
        self.ensure_initialized().await?;
        fs::write(self.flag_path(key), b"1").await
    }

    async fn take_flag(&self, key: &str) -> StoreResult<bool> {
        self.ensure_initialized().await?;

        // Removal doubles as the atomic read-and-clear.
        match fs::remove_file(self.flag_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.ensure_initialized().await?;

        for path in [self.stamp_path(key), self.flag_path(key)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to remove age record");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.ensure_initialized().await?;

        for dir in [STAMP_DIR, FLAG_DIR] {
            let dir = self.root.join(dir);
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    warn!(path = ?entry.path(), error = %e, "Failed to remove age record");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> FileAgeStore {
        FileAgeStore::new(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn stamps_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        store(&dir).store_timestamp("user:42", 1234).await.unwrap();

        // A second instance over the same root sees the record.
        let reopened = store(&dir);
        assert_eq!(reopened.load_timestamp("user:42").await.unwrap(), Some(1234));
        assert_eq!(reopened.load_timestamp("user:43").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.store_timestamp("user:42", 1).await.unwrap();
        store.store_timestamp("user:42", 2).await.unwrap();
        assert_eq!(store.load_timestamp("user:42").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn corrupt_record_degrades_to_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.store_timestamp("user:42", 1234).await.unwrap();
        fs::write(store.stamp_path("user:42"), b"not json")
            .await
            .unwrap();

        assert_eq!(store.load_timestamp("user:42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn flags_clear_on_take_and_persist_until_then() {
        let dir = tempfile::tempdir().unwrap();

        store(&dir).set_flag("user:42").await.unwrap();

        let reopened = store(&dir);
        assert!(reopened.take_flag("user:42").await.unwrap());
        assert!(!reopened.take_flag("user:42").await.unwrap());
    }

    #[tokio::test]
    async fn remove_drops_both_record_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.store_timestamp("user:42", 1).await.unwrap();
        store.set_flag("user:42").await.unwrap();
        store.remove("user:42").await.unwrap();

        assert_eq!(store.load_timestamp("user:42").await.unwrap(), None);
        assert!(!store.take_flag("user:42").await.unwrap());
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.store_timestamp("a", 1).await.unwrap();
        store.store_timestamp("b", 2).await.unwrap();
        store.set_flag("a").await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.load_timestamp("a").await.unwrap(), None);
        assert_eq!(store.load_timestamp("b").await.unwrap(), None);
        assert!(!store.take_flag("a").await.unwrap());
    }
}
