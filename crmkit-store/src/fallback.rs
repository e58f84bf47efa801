//! Primary store with a secondary used when the primary is unreachable.

use async_trait::async_trait;
use crmkit_schema::Record;
use tracing::warn;

use crate::error::Result;
use crate::store::RecordStore;

/// Routes every call to `primary`; on a transport failure the same call is
/// retried against `fallback`. Domain errors (missing record, lock busy,
/// corrupt data) are returned as-is.
pub struct FallbackRecordStore<P, F> {
    primary: P,
    fallback: F,
}

impl<P: RecordStore, F: RecordStore> FallbackRecordStore<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

macro_rules! with_fallback {
    ($self:ident, $op:literal, $key:expr, |$store:ident| $call:expr) => {{
        let $store = &$self.primary;
        match $call.await {
            Err(e) if e.is_transport() => {
                warn!(key = $key, op = $op, error = %e, "primary store unavailable, using fallback");
                let $store = &$self.fallback;
                $call.await
            }
            other => other,
        }
    }};
}

#[async_trait]
impl<P: RecordStore, F: RecordStore> RecordStore for FallbackRecordStore<P, F> {
    async fn get(&self, key: &str) -> Result<Vec<Record>> {
        with_fallback!(self, "get", key, |store| store.get(key))
    }

    async fn put(&self, key: &str, records: Vec<Record>) -> Result<()> {
        with_fallback!(self, "put", key, |store| store.put(key, records.clone()))
    }

    async fn get_record(&self, key: &str, id: &str) -> Result<Option<Record>> {
        with_fallback!(self, "get_record", key, |store| store.get_record(key, id))
    }

    async fn upsert(&self, key: &str, record: Record) -> Result<()> {
        with_fallback!(self, "upsert", key, |store| store.upsert(key, record.clone()))
    }

    async fn delete(&self, key: &str, id: &str) -> Result<Record> {
        with_fallback!(self, "delete", key, |store| store.delete(key, id))
    }
}
