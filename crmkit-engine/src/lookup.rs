//! Lookup label resolution.
//!
//! A Lookup value is the id of a record in another object's collection.
//! The resolver reads that collection from an injected `RecordStore` and
//! picks a display label with a per-object rule table, keyed by lower-cased
//! object apiName. Objects without an entry use the generic rules
//! (`name`, `label`, `title`). When nothing matches, or the store cannot be
//! read, the raw id is the label. Batch resolution reports ids that were
//! not found as `UnresolvedLookup` diagnostics.

use std::collections::HashMap;
use std::sync::LazyLock;

use crmkit_schema::catalog::{format_for_display, is_empty_value, stringify};
use crmkit_schema::{Diagnostic, ErrorKind, FieldDef, Record};
use crmkit_store::{collection_key, RecordStore};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

static DEFAULT_RESOLVER: LazyLock<LabelResolver> = LazyLock::new(LabelResolver::default);

/// One step in a label fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LabelRule {
    /// A single non-empty field
    Field { field: String },
    /// Non-empty fields joined by `separator`; at least one must be present
    Join {
        fields: Vec<String>,
        separator: String,
    },
    /// A composite value: either a plain string or an object whose `parts`
    /// are joined by spaces
    Composite { field: String, parts: Vec<String> },
}

impl LabelRule {
    pub fn field(field: impl Into<String>) -> Self {
        LabelRule::Field {
            field: field.into(),
        }
    }

    pub fn join<I, S>(fields: I, separator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LabelRule::Join {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    pub fn composite<I, S>(field: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LabelRule::Composite {
            field: field.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    fn apply(&self, record: &Record) -> Option<String> {
        match self {
            LabelRule::Field { field } => text(record.get(field)?),
            LabelRule::Join { fields, separator } => {
                let parts: Vec<String> = fields
                    .iter()
                    .filter_map(|f| record.get(f).and_then(text))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(separator))
            }
            LabelRule::Composite { field, parts } => match record.get(field)? {
                Value::Object(map) => {
                    let parts: Vec<String> =
                        parts.iter().filter_map(|p| map.get(p).and_then(text)).collect();
                    (!parts.is_empty()).then(|| parts.join(" "))
                }
                other => text(other),
            },
        }
    }
}

fn text(value: &Value) -> Option<String> {
    if is_empty_value(value) || value.is_object() {
        return None;
    }
    Some(stringify(value).trim().to_string())
}

/// Labels from `LabelResolver::resolve_labels`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLabels {
    /// id → label, in request order
    pub labels: IndexMap<String, String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Table-driven label heuristics.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    rules: HashMap<String, Vec<LabelRule>>,
    generic: Vec<LabelRule>,
}

impl Default for LabelResolver {
    /// Rules for the built-in CRM objects plus the generic fallback.
    fn default() -> Self {
        let person = vec![
            LabelRule::composite("name", ["firstName", "lastName"]),
            LabelRule::join(["firstName", "lastName"], " "),
            LabelRule::field("email"),
            LabelRule::field("contactNumber"),
        ];
        Self::empty()
            .with_rules("Contact", person.clone())
            .with_rules("Lead", person)
            .with_rules(
                "Account",
                vec![
                    LabelRule::field("accountName"),
                    LabelRule::field("name"),
                    LabelRule::field("accountNumber"),
                ],
            )
            .with_rules(
                "Deal",
                vec![LabelRule::field("dealName"), LabelRule::field("name")],
            )
            .with_rules(
                "Product",
                vec![
                    LabelRule::field("productName"),
                    LabelRule::field("name"),
                    LabelRule::field("sku"),
                ],
            )
    }
}

impl LabelResolver {
    /// No per-object rules; only the generic fallback.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            generic: vec![
                LabelRule::field("name"),
                LabelRule::field("label"),
                LabelRule::field("title"),
            ],
        }
    }

    /// Replace the rule chain for one object type.
    pub fn with_rules(mut self, object_type: &str, rules: Vec<LabelRule>) -> Self {
        self.rules.insert(object_type.to_lowercase(), rules);
        self
    }

    pub fn with_generic(mut self, rules: Vec<LabelRule>) -> Self {
        self.generic = rules;
        self
    }

    pub fn rules_for(&self, object_type: &str) -> &[LabelRule] {
        self.rules
            .get(&object_type.to_lowercase())
            .unwrap_or(&self.generic)
    }

    /// The label a found record would display as, falling back to its id.
    pub fn label_for(&self, object_type: &str, record: &Record) -> String {
        self.rules_for(object_type)
            .iter()
            .find_map(|rule| rule.apply(record))
            .unwrap_or_else(|| record.id.clone())
    }

    /// Label for `record_id`, or `None` when the record cannot be found.
    pub async fn try_resolve<S>(&self, object_type: &str, record_id: &str, store: &S) -> Option<String>
    where
        S: RecordStore + ?Sized,
    {
        let key = collection_key(object_type);
        match store.get_record(&key, record_id).await {
            Ok(Some(record)) => Some(self.label_for(object_type, &record)),
            Ok(None) => {
                debug!(object_type, record_id, "unresolved lookup: no such record");
                None
            }
            Err(e) => {
                debug!(object_type, record_id, error = %e, "unresolved lookup: store error");
                None
            }
        }
    }

    /// Label for `record_id`; the raw id when unresolved.
    pub async fn resolve_label<S>(&self, object_type: &str, record_id: &str, store: &S) -> String
    where
        S: RecordStore + ?Sized,
    {
        self.try_resolve(object_type, record_id, store)
            .await
            .unwrap_or_else(|| record_id.to_string())
    }

    /// Labels for many ids from one collection read, keyed by id in input order.
    ///
    /// Every id that falls back to its raw value gets an `UnresolvedLookup`
    /// diagnostic.
    pub async fn resolve_labels<S>(
        &self,
        object_type: &str,
        record_ids: &[&str],
        store: &S,
    ) -> ResolvedLabels
    where
        S: RecordStore + ?Sized,
    {
        let (records, failure) = match store.get(&collection_key(object_type)).await {
            Ok(records) => (records, None),
            Err(e) => {
                debug!(object_type, error = %e, "unresolved lookups: store error");
                (Vec::new(), Some(e.to_string()))
            }
        };
        let by_id: HashMap<&str, &Record> = records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut resolved = ResolvedLabels::default();
        for &id in record_ids {
            let label = match by_id.get(id) {
                Some(record) => self.label_for(object_type, record),
                None => {
                    let message = match &failure {
                        Some(e) => format!("{object_type} '{id}' could not be read: {e}"),
                        None => format!("no {object_type} record with id '{id}'"),
                    };
                    resolved
                        .diagnostics
                        .push(Diagnostic::new(ErrorKind::UnresolvedLookup, id, message));
                    id.to_string()
                }
            };
            resolved.labels.insert(id.to_string(), label);
        }
        resolved
    }

    /// Display text for any field value; Lookup kinds resolve through the store.
    pub async fn display_value<S>(&self, field: &FieldDef, value: &Value, store: &S) -> String
    where
        S: RecordStore + ?Sized,
    {
        if is_empty_value(value) {
            return String::new();
        }
        match (&field.lookup_object, field.type_.is_lookup()) {
            (Some(target), true) => self.resolve_label(target, &stringify(value), store).await,
            _ => format_for_display(field, value),
        }
    }
}

/// `LabelResolver::resolve_label` with the default rule table.
pub async fn resolve_label<S>(object_type: &str, record_id: &str, store: &S) -> String
where
    S: RecordStore + ?Sized,
{
    DEFAULT_RESOLVER
        .resolve_label(object_type, record_id, store)
        .await
}

/// `LabelResolver::display_value` with the default rule table.
pub async fn display_value<S>(field: &FieldDef, value: &Value, store: &S) -> String
where
    S: RecordStore + ?Sized,
{
    DEFAULT_RESOLVER.display_value(field, value, store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmkit_schema::FieldType;
    use crmkit_store::{MemoryRecordStore, StoreError};
    use serde_json::json;

    async fn store() -> MemoryRecordStore {
        MemoryRecordStore::new()
            .with_collection(
                "contacts",
                vec![
                    Record::new("c1").with("firstName", "Ada").with("lastName", "Lovelace"),
                    Record::new("c2").with("email", "grace@navy.mil"),
                    Record::new("c3").with("name", json!({"firstName": "Alan", "lastName": "Turing"})),
                    Record::new("c4"),
                ],
            )
            .await
            .with_collection(
                "companies",
                vec![Record::new("co1").with("title", "Initech")],
            )
            .await
    }

    #[tokio::test]
    async fn contact_first_and_last_name() {
        let store = store().await;
        assert_eq!(resolve_label("Contact", "c1", &store).await, "Ada Lovelace");
        assert_eq!(resolve_label("Contact", "missing", &store).await, "missing");
    }

    #[tokio::test]
    async fn contact_fallback_chain() {
        let store = store().await;
        assert_eq!(resolve_label("Contact", "c2", &store).await, "grace@navy.mil");
        assert_eq!(resolve_label("Contact", "c3", &store).await, "Alan Turing");
        assert_eq!(resolve_label("Contact", "c4", &store).await, "c4");
    }

    #[tokio::test]
    async fn custom_objects_use_generic_rules() {
        let store = store().await;
        assert_eq!(resolve_label("Company", "co1", &store).await, "Initech");
        // absent collection
        assert_eq!(resolve_label("Vendor", "v1", &store).await, "v1");
    }

    #[tokio::test]
    async fn object_type_is_case_insensitive() {
        let store = store().await;
        assert_eq!(resolve_label("contact", "c1", &store).await, "Ada Lovelace");
        assert_eq!(resolve_label("CONTACT", "c1", &store).await, "Ada Lovelace");
    }

    #[tokio::test]
    async fn custom_rule_table() {
        let store = MemoryRecordStore::new()
            .with_collection("assets", vec![Record::new("a1").with("serial", "SN-42")])
            .await;
        let resolver = LabelResolver::default().with_rules("Asset", vec![LabelRule::field("serial")]);
        assert_eq!(resolver.resolve_label("Asset", "a1", &store).await, "SN-42");
        assert_eq!(
            LabelResolver::default().resolve_label("Asset", "a1", &store).await,
            "a1"
        );
    }

    #[tokio::test]
    async fn store_errors_degrade_to_raw_id() {
        struct Offline;

        #[async_trait::async_trait]
        impl RecordStore for Offline {
            async fn get(&self, _: &str) -> crmkit_store::Result<Vec<Record>> {
                Err(StoreError::unavailable("offline"))
            }
            async fn put(&self, _: &str, _: Vec<Record>) -> crmkit_store::Result<()> {
                Err(StoreError::unavailable("offline"))
            }
        }

        assert_eq!(resolve_label("Contact", "c1", &Offline).await, "c1");
        let resolved = DEFAULT_RESOLVER
            .resolve_labels("Contact", &["c1"], &Offline)
            .await;
        assert_eq!(resolved.labels["c1"], "c1");
        assert_eq!(resolved.diagnostics.len(), 1);
        assert_eq!(resolved.diagnostics[0].kind, ErrorKind::UnresolvedLookup);
        assert!(resolved.diagnostics[0].message.contains("offline"));
    }

    #[tokio::test]
    async fn batch_resolution_keeps_input_order() {
        let store = store().await;
        let resolved = DEFAULT_RESOLVER
            .resolve_labels("Contact", &["c2", "nope", "c1"], &store)
            .await;
        let pairs: Vec<_> = resolved
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [("c2", "grace@navy.mil"), ("nope", "nope"), ("c1", "Ada Lovelace")]
        );

        let subjects: Vec<_> = resolved.diagnostics.iter().map(|d| d.subject.as_str()).collect();
        assert_eq!(subjects, ["nope"]);
        assert_eq!(resolved.diagnostics[0].kind, ErrorKind::UnresolvedLookup);

        // c4 is found even though its label falls back to the id
        let all_found = DEFAULT_RESOLVER
            .resolve_labels("Contact", &["c1", "c4"], &store)
            .await;
        assert!(all_found.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn display_value_dispatches_on_field_type() {
        let store = store().await;
        let lookup = FieldDef::new("primaryContact", "Contact", FieldType::Lookup).with_lookup("Contact");
        assert_eq!(display_value(&lookup, &json!("c1"), &store).await, "Ada Lovelace");
        assert_eq!(display_value(&lookup, &json!(null), &store).await, "");

        let price = FieldDef::new("unitPrice", "Price", FieldType::Currency);
        assert_eq!(display_value(&price, &json!(1234.5), &store).await, "$1234.50");
    }

    #[test]
    fn rules_deserialize_from_yaml() {
        let rules: Vec<LabelRule> = serde_yaml::from_str(
            r#"
- kind: field
  field: nickname
- kind: join
  fields: [firstName, lastName]
  separator: " "
"#,
        )
        .unwrap();
        assert_eq!(rules[0], LabelRule::field("nickname"));
        assert_eq!(rules[1], LabelRule::join(["firstName", "lastName"], " "));
    }
}
