//! Validated record writes.
//!
//! `RecordService` is the only path that mutates stored records. Every
//! create or update is validated against the layout that applies to the
//! record; nothing is written when validation fails. Writes to one
//! collection go through a per-collection queue so AutoNumber assignment
//! never hands out the same number twice.

use std::sync::Arc;

use chrono::Utc;
use crmkit_schema::catalog::{default_value, is_empty_value};
use crmkit_schema::{
    ErrorKind, FieldType, LayoutType, ObjectDef, Record, Schema, SchemaError,
};
use crmkit_store::{collection_key, FileRecordStore, RecordStore, StoreError};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::validation::{ValidationReport, Validator};

pub struct RecordService<S: RecordStore> {
    schema: Schema,
    store: S,
    actor: String,
    writers: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: RecordStore> RecordService<S> {
    pub fn new(schema: Schema, store: S) -> Self {
        Self::from_config(schema, store, &EngineConfig::default())
    }

    pub fn from_config(schema: Schema, store: S, config: &EngineConfig) -> Self {
        Self {
            schema,
            store,
            actor: config.default_actor.clone(),
            writers: DashMap::new(),
        }
    }

    /// Stamp writes with `actor` instead of the configured default.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Swap in a new schema snapshot, e.g. after an administrator edit.
    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get(&self, object: &str, id: &str) -> Result<Record> {
        let def = self.object(object)?;
        self.store
            .get_record(&collection_key(&def.api_name), id)
            .await?
            .ok_or_else(|| record_not_found(def, id))
    }

    pub async fn list(&self, object: &str) -> Result<Vec<Record>> {
        let def = self.object(object)?;
        Ok(self.store.get(&collection_key(&def.api_name)).await?)
    }

    /// Validate a would-be new record without writing it.
    pub fn check_create(&self, object: &str, input: &Record) -> Result<ValidationReport> {
        let def = self.object(object)?;
        let (record, baseline) = prepare_create(def, input.clone())?;
        let layout = def
            .layout_for(&record, LayoutType::Create)
            .ok_or_else(|| layout_not_found(def, LayoutType::Create))?;
        Ok(Validator::new(def)
            .with_baseline(&baseline)
            .with_rules(&def.validation_rules)
            .validate(layout, &record))
    }

    /// Create a record from user input.
    ///
    /// Missing values are filled with catalog defaults and the object's
    /// default record type. AutoNumber values and audit columns are assigned
    /// after validation, replacing any the caller supplied. An empty id gets
    /// a fresh ULID; an id already in the collection is rejected.
    pub async fn create(&self, object: &str, input: Record) -> Result<Record> {
        let def = self.object(object)?;
        let (mut record, baseline) = prepare_create(def, input)?;
        let layout = def
            .layout_for(&record, LayoutType::Create)
            .ok_or_else(|| layout_not_found(def, LayoutType::Create))?;
        let report = Validator::new(def)
            .with_baseline(&baseline)
            .with_rules(&def.validation_rules)
            .validate(layout, &record);
        reject_unless_committable(def, report)?;

        let key = collection_key(&def.api_name);
        let writer = self.writer(&key);
        let _guard = writer.lock().await;

        let existing = self.store.get(&key).await?;
        if record.id.is_empty() {
            record.id = Ulid::new().to_string();
        }
        if existing.iter().any(|r| r.id == record.id) {
            return Err(EngineError::RecordExists {
                object: def.api_name.clone(),
                id: record.id,
            });
        }
        for field in def.fields.iter().filter(|f| f.type_ == FieldType::AutoNumber) {
            let format = AutoNumberFormat::parse(field.display_format.as_deref());
            let next = existing
                .iter()
                .filter_map(|r| r.get(&field.api_name).and_then(|v| format.number(v)))
                .max()
                .unwrap_or(0)
                + 1;
            record.set(field.api_name.clone(), Value::String(format.render(next)));
        }
        record.stamp_created(&self.actor, Utc::now());

        self.store.upsert(&key, record.clone()).await?;
        info!(object = %def.api_name, id = %record.id, actor = %self.actor, "record created");
        Ok(record)
    }

    /// Apply `changes` to a stored record after validating the result
    /// against its edit layout.
    pub async fn update(
        &self,
        object: &str,
        id: &str,
        changes: Map<String, Value>,
    ) -> Result<Record> {
        let def = self.object(object)?;
        check_known_fields(def, changes.keys())?;

        let key = collection_key(&def.api_name);
        let writer = self.writer(&key);
        let _guard = writer.lock().await;

        let stored = self
            .store
            .get_record(&key, id)
            .await?
            .ok_or_else(|| record_not_found(def, id))?;

        let changed: Vec<String> = changes.keys().cloned().collect();
        let mut record = stored.clone();
        for (api_name, value) in changes {
            record.set(api_name, value);
        }

        let layout = def
            .layout_for(&record, LayoutType::Edit)
            .ok_or_else(|| layout_not_found(def, LayoutType::Edit))?;
        let mut report = Validator::new(def)
            .with_baseline(&stored)
            .with_rules(&def.validation_rules)
            .validate(layout, &record);
        // Read-only fields off the layout are still read-only
        for name in &changed {
            let read_only = def.field(name).is_some_and(|f| f.is_effectively_read_only());
            if read_only && !same_value(stored.get(name), record.get(name)) {
                report
                    .errors
                    .entry(name.clone())
                    .or_insert(ErrorKind::ReadOnlyViolation);
            }
        }
        reject_unless_committable(def, report)?;

        record.stamp_modified(&self.actor, Utc::now());
        self.store.upsert(&key, record.clone()).await?;
        info!(object = %def.api_name, id = %record.id, actor = %self.actor, "record updated");
        Ok(record)
    }

    pub async fn update_field(
        &self,
        object: &str,
        id: &str,
        api_name: &str,
        value: Value,
    ) -> Result<Record> {
        let mut changes = Map::new();
        changes.insert(api_name.to_string(), value);
        self.update(object, id, changes).await
    }

    /// Remove a record, returning it.
    pub async fn delete(&self, object: &str, id: &str) -> Result<Record> {
        let def = self.object(object)?;
        let key = collection_key(&def.api_name);
        let writer = self.writer(&key);
        let _guard = writer.lock().await;

        let removed = self.store.delete(&key, id).await.map_err(|e| match e {
            StoreError::RecordNotFound { .. } => record_not_found(def, id),
            other => other.into(),
        })?;
        info!(object = %def.api_name, id, actor = %self.actor, "record deleted");
        Ok(removed)
    }

    fn object(&self, api_name: &str) -> Result<&ObjectDef> {
        self.schema
            .object(api_name)
            .ok_or_else(|| EngineError::object_not_found(api_name))
    }

    fn writer(&self, key: &str) -> Arc<Mutex<()>> {
        self.writers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The record to validate and the defaults-only baseline it is compared to.
impl RecordService<FileRecordStore> {
    /// Service over the configured schema and record directories.
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        let ctx = config.open_schema().await?;
        Ok(Self::from_config(ctx.schema(), config.record_store(), config))
    }
}

fn prepare_create(def: &ObjectDef, input: Record) -> Result<(Record, Record)> {
    check_known_fields(def, input.values.keys())?;

    let mut baseline = Record::default();
    for field in &def.fields {
        let value = default_value(field);
        if !value.is_null() {
            baseline.set(field.api_name.clone(), value);
        }
    }

    let mut record = input;
    for (api_name, value) in &baseline.values {
        if !record.values.contains_key(api_name) {
            record.set(api_name.clone(), value.clone());
        }
    }
    if record.record_type_id.is_none() {
        record.record_type_id = def.default_record_type_id.clone();
    }
    Ok((record, baseline))
}

fn check_known_fields<'a>(
    def: &ObjectDef,
    names: impl IntoIterator<Item = &'a String>,
) -> Result<()> {
    for name in names {
        if def.field(name).is_none() {
            return Err(SchemaError::FieldNotFound {
                object: def.api_name.clone(),
                field: name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn reject_unless_committable(def: &ObjectDef, report: ValidationReport) -> Result<()> {
    if report.is_committable() {
        return Ok(());
    }
    debug!(
        object = %def.api_name,
        errors = report.errors.len(),
        rule_violations = report.rule_violations.len(),
        "write rejected"
    );
    Err(EngineError::ValidationFailed {
        errors: report.errors,
        rules: report.rule_violations,
    })
}

fn same_value(a: Option<&Value>, b: Option<&Value>) -> bool {
    let empty = |v: Option<&Value>| v.is_none_or(is_empty_value);
    a == b || (empty(a) && empty(b))
}

fn record_not_found(def: &ObjectDef, id: &str) -> EngineError {
    EngineError::RecordNotFound {
        object: def.api_name.clone(),
        id: id.to_string(),
    }
}

fn layout_not_found(def: &ObjectDef, layout_type: LayoutType) -> EngineError {
    EngineError::LayoutNotFound {
        object: def.api_name.clone(),
        layout_type: format!("{layout_type:?}").to_lowercase(),
    }
}

/// `PREFIX{000}SUFFIX`: the zeros give the minimum digit count.
#[derive(Debug, PartialEq)]
struct AutoNumberFormat<'a> {
    prefix: &'a str,
    width: usize,
    suffix: &'a str,
}

impl<'a> AutoNumberFormat<'a> {
    fn parse(format: Option<&'a str>) -> Self {
        let plain = Self {
            prefix: "",
            width: 0,
            suffix: "",
        };
        let Some(format) = format else {
            return plain;
        };
        let Some(open) = format.find('{') else {
            return plain;
        };
        let Some(len) = format[open..].find('}') else {
            return plain;
        };
        let inner = &format[open + 1..open + len];
        if !inner.chars().all(|c| c == '0') {
            return plain;
        }
        Self {
            prefix: &format[..open],
            width: inner.len(),
            suffix: &format[open + len + 1..],
        }
    }

    fn render(&self, n: u64) -> String {
        format!("{}{:0width$}{}", self.prefix, n, self.suffix, width = self.width)
    }

    fn number(&self, value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s
                .strip_prefix(self.prefix)?
                .strip_suffix(self.suffix)?
                .parse()
                .ok(),
            _ => None,
        }
    }
}

/// Field errors keyed so callers can show rule failures next to fields.
///
/// Rule violations land on their `error_field`, or on the rule name when
/// they have none, as `InvalidFormat`.
pub fn error_map(err: &EngineError) -> IndexMap<String, ErrorKind> {
    match err {
        EngineError::ValidationFailed { errors, rules } => {
            let mut map = errors.clone();
            for rule in rules {
                let key = rule.field.clone().unwrap_or_else(|| rule.rule.clone());
                map.entry(key).or_insert(ErrorKind::InvalidFormat);
            }
            map
        }
        _ => IndexMap::new(),
    }
}
