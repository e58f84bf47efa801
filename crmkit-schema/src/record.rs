//! Record values stored against an object definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::is_empty_value;

/// A single record: system columns plus a map from field apiName to value.
///
/// Field values are flattened next to the system columns when serialized,
/// so a record reads as one plain JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_layout_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder-style setter for a field value.
    pub fn with(mut self, api_name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(api_name.into(), value.into());
        self
    }

    pub fn get(&self, api_name: &str) -> Option<&Value> {
        self.values.get(api_name)
    }

    pub fn set(&mut self, api_name: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(api_name.into(), value)
    }

    pub fn remove(&mut self, api_name: &str) -> Option<Value> {
        self.values.remove(api_name)
    }

    /// True when the field is present and not empty.
    pub fn has_value(&self, api_name: &str) -> bool {
        self.get(api_name).is_some_and(|v| !is_empty_value(v))
    }

    /// Stamp audit columns for a newly created record.
    pub fn stamp_created(&mut self, actor: &str, at: DateTime<Utc>) {
        self.created_by = Some(actor.to_string());
        self.created_at = Some(at);
        self.stamp_modified(actor, at);
    }

    pub fn stamp_modified(&mut self, actor: &str, at: DateTime<Utc>) {
        self.last_modified_by = Some(actor.to_string());
        self.last_modified_at = Some(at);
    }
}
