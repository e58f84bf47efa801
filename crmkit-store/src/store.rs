//! The record store boundary.
//!
//! A store is a keyed set of record collections. The whole-collection
//! `get`/`put` pair is the minimal contract every backend provides; the
//! per-record operations have read-modify-write defaults that indexed
//! backends override.

use async_trait::async_trait;
use crmkit_schema::Record;

use crate::error::{Result, StoreError};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a whole collection. A missing collection reads as empty.
    async fn get(&self, key: &str) -> Result<Vec<Record>>;

    /// Replace a whole collection.
    async fn put(&self, key: &str, records: Vec<Record>) -> Result<()>;

    /// Read one record by id.
    async fn get_record(&self, key: &str, id: &str) -> Result<Option<Record>> {
        Ok(self.get(key).await?.into_iter().find(|r| r.id == id))
    }

    /// Insert or replace a record by id.
    async fn upsert(&self, key: &str, record: Record) -> Result<()> {
        let mut records = self.get(key).await?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.put(key, records).await
    }

    /// Remove a record by id, returning it.
    async fn delete(&self, key: &str, id: &str) -> Result<Record> {
        let mut records = self.get(key).await?;
        let idx = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::RecordNotFound {
                key: key.to_string(),
                id: id.to_string(),
            })?;
        let removed = records.remove(idx);
        self.put(key, records).await?;
        Ok(removed)
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Vec<Record>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, records: Vec<Record>) -> Result<()> {
        (**self).put(key, records).await
    }

    async fn get_record(&self, key: &str, id: &str) -> Result<Option<Record>> {
        (**self).get_record(key, id).await
    }

    async fn upsert(&self, key: &str, record: Record) -> Result<()> {
        (**self).upsert(key, record).await
    }

    async fn delete(&self, key: &str, id: &str) -> Result<Record> {
        (**self).delete(key, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Only implements the required methods, exercising the defaults.
    #[derive(Default)]
    struct SnapshotStore {
        collections: Mutex<HashMap<String, Vec<Record>>>,
    }

    #[async_trait]
    impl RecordStore for SnapshotStore {
        async fn get(&self, key: &str) -> Result<Vec<Record>> {
            Ok(self
                .collections
                .lock()
                .await
                .get(key)
                .cloned()
                .unwrap_or_default())
        }

        async fn put(&self, key: &str, records: Vec<Record>) -> Result<()> {
            self.collections
                .lock()
                .await
                .insert(key.to_string(), records);
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_upsert_inserts_then_replaces() {
        let store = SnapshotStore::default();
        store
            .upsert("contacts", Record::new("c1").with("firstName", "Ada"))
            .await
            .unwrap();
        store
            .upsert("contacts", Record::new("c1").with("firstName", "Grace"))
            .await
            .unwrap();

        let records = store.get("contacts").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("firstName").and_then(|v| v.as_str()),
            Some("Grace")
        );
    }

    #[tokio::test]
    async fn default_get_record_and_delete() {
        let store = SnapshotStore::default();
        store
            .put("deals", vec![Record::new("d1"), Record::new("d2")])
            .await
            .unwrap();

        assert!(store.get_record("deals", "d2").await.unwrap().is_some());
        assert!(store.get_record("deals", "d3").await.unwrap().is_none());

        let removed = store.delete("deals", "d1").await.unwrap();
        assert_eq!(removed.id, "d1");
        assert_eq!(store.get("deals").await.unwrap().len(), 1);

        let err = store.delete("deals", "d1").await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_collection_reads_empty() {
        let store = SnapshotStore::default();
        assert!(store.get("nothing").await.unwrap().is_empty());
    }
}
