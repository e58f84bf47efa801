//! In-memory store holding each collection as an ordered list.

use std::collections::HashMap;

use async_trait::async_trait;
use crmkit_schema::Record;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::RecordStore;

/// Collections keyed by name, records in the order they were written.
///
/// `put` keeps its input as given, duplicates and empty ids included.
/// `upsert` and `delete` act on the first record with a matching id.
/// All writes go through one `RwLock`, so the store has a single writer.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection, replacing whatever was there.
    pub async fn with_collection(self, key: &str, records: Vec<Record>) -> Self {
        self.collections
            .write()
            .await
            .insert(key.to_string(), records);
        self
    }

    pub async fn len(&self, key: &str) -> usize {
        self.collections.read().await.get(key).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Vec<Record>> {
        Ok(self
            .collections
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, key: &str, records: Vec<Record>) -> Result<()> {
        self.collections
            .write()
            .await
            .insert(key.to_string(), records);
        Ok(())
    }

    async fn get_record(&self, key: &str, id: &str) -> Result<Option<Record>> {
        Ok(self
            .collections
            .read()
            .await
            .get(key)
            .and_then(|c| c.iter().find(|r| r.id == id))
            .cloned())
    }

    async fn upsert(&self, key: &str, record: Record) -> Result<()> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(key.to_string()).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn delete(&self, key: &str, id: &str) -> Result<Record> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(key)
            .and_then(|c| c.iter().position(|r| r.id == id).map(|i| c.remove(i)))
            .ok_or_else(|| StoreError::RecordNotFound {
                key: key.to_string(),
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_preserves_insertion_order() {
        let store = MemoryRecordStore::new();
        for id in ["b", "a", "c"] {
            store.upsert("deals", Record::new(id)).await.unwrap();
        }
        store
            .upsert("deals", Record::new("a").with("stage", "Proposal"))
            .await
            .unwrap();

        let ids: Vec<_> = store
            .get("deals")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert_eq!(store.len("deals").await, 3);
    }

    #[tokio::test]
    async fn seeded_collection_is_readable() {
        let store = MemoryRecordStore::new()
            .with_collection("contacts", vec![Record::new("c1").with("lastName", "Hopper")])
            .await;
        let found = store.get_record("contacts", "c1").await.unwrap().unwrap();
        assert_eq!(found.get("lastName").unwrap(), "Hopper");
    }

    #[tokio::test]
    async fn delete_unknown_record_errors() {
        let store = MemoryRecordStore::new();
        let err = store.delete("contacts", "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn put_keeps_duplicate_and_blank_ids() {
        let store = MemoryRecordStore::new();
        store
            .put(
                "deals",
                vec![
                    Record::new(""),
                    Record::new("x").with("stage", "Proposal"),
                    Record::new(""),
                    Record::new("x").with("stage", "Closed Won"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.len("deals").await, 4);

        let first = store.get_record("deals", "x").await.unwrap().unwrap();
        assert_eq!(first.get("stage").unwrap(), "Proposal");

        store.delete("deals", "x").await.unwrap();
        let remaining = store.get("deals").await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining[2].get("stage").unwrap(), "Closed Won");
    }

    #[tokio::test]
    async fn put_replaces_collection() {
        let store = MemoryRecordStore::new();
        store.upsert("deals", Record::new("old")).await.unwrap();
        store
            .put("deals", vec![Record::new("n1"), Record::new("n2")])
            .await
            .unwrap();
        assert!(store.get_record("deals", "old").await.unwrap().is_none());
        assert_eq!(store.len("deals").await, 2);
    }
}
