//! File-backed record store.
//!
//! ```text
//! records/
//!   accounts.json      ← one JSON array per collection
//!   accounts.lock      ← exclusive lock held during writes
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use crmkit_schema::Record;
use dashmap::DashMap;
use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use ulid::Ulid;

use crate::error::{Result, StoreError};
use crate::store::RecordStore;

/// Collections persisted as `<root>/<key>.json`.
///
/// Writers in this process serialize per key on an async mutex. Writers in
/// other processes are turned away with `LockBusy` by the `.lock` file.
pub struct FileRecordStore {
    root: PathBuf,
    writers: DashMap<String, Arc<Mutex<()>>>,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writers: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.lock"))
    }

    fn writer(&self, key: &str) -> Arc<Mutex<()>> {
        self.writers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Try to take the cross-process lock for a collection (non-blocking).
    async fn lock(&self, key: &str) -> Result<CollectionLock> {
        fs::create_dir_all(&self.root).await?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.lock_path(key))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(CollectionLock { file }),
            Err(_) => Err(StoreError::LockBusy {
                key: key.to_string(),
            }),
        }
    }

    async fn read_collection(&self, key: &str) -> Result<Vec<Record>> {
        let path = self.collection_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_collection(&self, key: &str, records: &[Record]) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;
        atomic_write(&self.collection_path(key), content.as_bytes()).await?;
        debug!(key, records = records.len(), "collection written");
        Ok(())
    }

    /// Run a read-modify-write cycle under both locks.
    async fn modify<T: Send>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Vec<Record>) -> Result<T> + Send,
    ) -> Result<T> {
        let writer = self.writer(key);
        let _guard = writer.lock().await;
        let _lock = self.lock(key).await?;

        let mut records = self.read_collection(key).await?;
        let out = f(&mut records)?;
        self.write_collection(key, &records).await?;
        Ok(out)
    }
}

/// Releases the collection lock on drop.
struct CollectionLock {
    file: std::fs::File,
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, key: &str) -> Result<Vec<Record>> {
        self.read_collection(key).await
    }

    async fn put(&self, key: &str, records: Vec<Record>) -> Result<()> {
        self.modify(key, move |existing| {
            *existing = records;
            Ok(())
        })
        .await
    }

    async fn upsert(&self, key: &str, record: Record) -> Result<()> {
        self.modify(key, move |records| {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str, id: &str) -> Result<Record> {
        self.modify(key, |records| {
            let idx = records.iter().position(|r| r.id == id).ok_or_else(|| {
                StoreError::RecordNotFound {
                    key: key.to_string(),
                    id: id.to_string(),
                }
            })?;
            Ok(records.remove(idx))
        })
        .await
    }
}

/// Atomic write via temp file and rename
async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension(format!("{}.tmp", Ulid::new()));
    fs::write(&temp_path, content).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}
