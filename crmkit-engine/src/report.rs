//! Report query engine.
//!
//! A `ReportSpec` runs over the records of one object in a fixed pipeline:
//! project each record onto the requested fields, then filter (all
//! conditions ANDed), sort and group the projected rows. Projected fields
//! resolve against the record under the exact name first, then with an
//! `Object.` / `Object_` prefix stripped. Filter, sort and group fields only
//! see what was projected. Missing values project as `null`.
//!
//! Nothing in a run fails. Unknown operators are skipped and, when the
//! engine is bound to an `ObjectDef`, references to fields the object does
//! not define are reported as diagnostics.

use std::cmp::Ordering;

use crmkit_schema::catalog::{as_number, is_empty_value, stringify};
use crmkit_schema::{ConditionOperator, Diagnostic, ObjectDef, Record};
use crmkit_store::{collection_key, RecordStore};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::aggregate::{aggregate, AggregateFieldStrategy, Aggregates};
use crate::error::Result;
use crate::logging::Pretty;

/// Group key for rows whose group field is empty.
pub const UNASSIGNED: &str = "Unassigned";

/// Fields every record carries outside its value map.
const SYSTEM_FIELDS: [&str; 7] = [
    "id",
    "recordTypeId",
    "pageLayoutId",
    "createdBy",
    "createdAt",
    "lastModifiedBy",
    "lastModifiedAt",
];

/// One output row: requested field name → value, in request order.
pub type ProjectedRecord = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(default)]
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<ConditionOperator>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Conditions without a field, or without a value for a binary operator, match everything.
    pub fn is_noop(&self) -> bool {
        self.field.trim().is_empty() || (!self.operator.is_unary() && is_empty_value(&self.value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSpec {
    pub object_type: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl ReportSpec {
    pub fn new<I, S>(object_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object_type: object_type.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            filters: Vec::new(),
            group_by: None,
            sort_by: None,
            sort_order: None,
        }
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    pub fn group(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }

    /// Every field the report reads, in first-reference order.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let candidates = self
            .fields
            .iter()
            .chain(self.filters.iter().map(|f| &f.field))
            .chain(self.sort_by.iter())
            .chain(self.group_by.iter());
        for name in candidates {
            let name = name.as_str();
            if !name.trim().is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    pub rows: Vec<ProjectedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<IndexMap<String, Vec<ProjectedRecord>>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl RunResult {
    /// Aggregates over all rows.
    pub fn aggregates(&self, strategy: &dyn AggregateFieldStrategy) -> Aggregates {
        aggregate(&self.rows, strategy)
    }

    /// Aggregates per group, in group order. Empty when the run was not grouped.
    pub fn group_aggregates(
        &self,
        strategy: &dyn AggregateFieldStrategy,
    ) -> IndexMap<String, Aggregates> {
        self.groups
            .iter()
            .flatten()
            .map(|(key, rows)| (key.clone(), aggregate(rows, strategy)))
            .collect()
    }
}

/// Runs report specs, optionally checking field references against an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportEngine<'a> {
    object: Option<&'a ObjectDef>,
}

impl<'a> ReportEngine<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_object(object: &'a ObjectDef) -> Self {
        Self {
            object: Some(object),
        }
    }

    pub fn run(&self, spec: &ReportSpec, records: &[Record]) -> RunResult {
        trace!("running report: {}", Pretty(spec));
        let object_type = spec.object_type.as_str();
        let mut diagnostics = self.unknown_fields(spec);

        for filter in &spec.filters {
            if let ConditionOperator::Unknown(op) = &filter.operator {
                diagnostics.push(Diagnostic::malformed_condition(
                    filter.field.as_str(),
                    format!("unknown filter operator '{op}'; filter ignored"),
                ));
            }
        }

        let projected: Vec<Row> = records
            .iter()
            .map(|record| project(record, &spec.fields, object_type))
            .collect();

        let mut matched: Vec<&Row> = projected
            .iter()
            .filter(|row| spec.filters.iter().all(|f| matches(f, row, object_type)))
            .collect();

        if let Some(sort_by) = spec.sort_by.as_deref().filter(|s| !s.trim().is_empty()) {
            let descending = spec.sort_order == Some(SortOrder::Desc);
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    &cell_value(a, sort_by, object_type),
                    &cell_value(b, sort_by, object_type),
                );
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let groups = spec
            .group_by
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .map(|group_by| {
                let mut groups: IndexMap<String, Vec<ProjectedRecord>> = IndexMap::new();
                for row in &matched {
                    let key = group_key(&cell_value(row, group_by, object_type));
                    groups.entry(key).or_default().push(finish(row));
                }
                groups
            });

        let rows: Vec<ProjectedRecord> = matched.iter().map(|row| finish(row)).collect();

        for d in &diagnostics {
            warn!(object_type, kind = %d.kind, subject = %d.subject, "{}", d.message);
        }
        debug!(
            object_type,
            scanned = records.len(),
            rows = rows.len(),
            groups = groups.as_ref().map_or(0, IndexMap::len),
            "report run"
        );

        RunResult {
            rows,
            groups,
            diagnostics,
        }
    }

    /// Read the object's collection from `store` and run over it.
    pub async fn run_stored<S>(&self, spec: &ReportSpec, store: &S) -> Result<RunResult>
    where
        S: RecordStore + ?Sized,
    {
        let records = store.get(&collection_key(&spec.object_type)).await?;
        Ok(self.run(spec, &records))
    }

    fn unknown_fields(&self, spec: &ReportSpec) -> Vec<Diagnostic> {
        let Some(object) = self.object else {
            return Vec::new();
        };
        let context = format!("object '{}'", object.api_name);
        spec.referenced_fields()
            .into_iter()
            .filter(|name| {
                let bare = strip_prefix(name, &object.api_name).unwrap_or(name);
                !SYSTEM_FIELDS.contains(&bare) && object.field(bare).is_none()
            })
            .map(|name| Diagnostic::unknown_field(name, &context))
            .collect()
    }
}

/// `ReportEngine::new().run(spec, records)`.
pub fn run(spec: &ReportSpec, records: &[Record]) -> RunResult {
    ReportEngine::new().run(spec, records)
}

fn strip_prefix<'n>(name: &'n str, object_type: &str) -> Option<&'n str> {
    let head = name.get(..object_type.len())?;
    if !head.eq_ignore_ascii_case(object_type) {
        return None;
    }
    let rest = &name[object_type.len()..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix('_'))
        .filter(|s| !s.is_empty())
}

fn lookup(record: &Record, name: &str) -> Option<Value> {
    let system = match name {
        "id" => Some(Value::String(record.id.clone())),
        "recordTypeId" => record.record_type_id.clone().map(Value::String),
        "pageLayoutId" => record.page_layout_id.clone().map(Value::String),
        "createdBy" => record.created_by.clone().map(Value::String),
        "lastModifiedBy" => record.last_modified_by.clone().map(Value::String),
        "createdAt" => record.created_at.map(|t| Value::String(t.to_rfc3339())),
        "lastModifiedAt" => record.last_modified_at.map(|t| Value::String(t.to_rfc3339())),
        _ => None,
    };
    system.or_else(|| record.get(name).cloned())
}

/// Value of `name` on `record`: exact name, then with the object prefix stripped.
fn resolve_opt(record: &Record, name: &str, object_type: &str) -> Option<Value> {
    lookup(record, name).or_else(|| {
        strip_prefix(name, object_type).and_then(|bare| lookup(record, bare))
    })
}

/// A projected row before output; `None` marks a field the record lacks.
type Row = IndexMap<String, Option<Value>>;

fn project(record: &Record, fields: &[String], object_type: &str) -> Row {
    fields
        .iter()
        .map(|f| (f.clone(), resolve_opt(record, f, object_type)))
        .collect()
}

fn finish(row: &Row) -> ProjectedRecord {
    row.iter()
        .map(|(k, v)| (k.clone(), v.clone().unwrap_or(Value::Null)))
        .collect()
}

/// Cell of `row` named `name`: exact key, then any key naming the same bare field.
/// Fields outside the projection read as missing.
fn cell<'r>(row: &'r Row, name: &str, object_type: &str) -> Option<&'r Value> {
    if let Some(value) = row.get(name) {
        return value.as_ref();
    }
    let bare = strip_prefix(name, object_type).unwrap_or(name);
    row.iter()
        .find(|(key, _)| strip_prefix(key, object_type).unwrap_or(key) == bare)
        .and_then(|(_, value)| value.as_ref())
}

fn cell_value(row: &Row, name: &str, object_type: &str) -> Value {
    cell(row, name, object_type).cloned().unwrap_or(Value::Null)
}

fn matches(filter: &FilterCondition, row: &Row, object_type: &str) -> bool {
    if filter.is_noop() {
        return true;
    }
    let actual = cell(row, &filter.field, object_type);
    let expected = &filter.value;
    let text = || {
        actual
            .map(|v| stringify(v).to_lowercase())
            .unwrap_or_default()
    };
    let needle = || stringify(expected).to_lowercase();
    let numbers = || (js_number(actual), js_number(Some(expected)));

    match &filter.operator {
        ConditionOperator::Equals => text() == needle(),
        ConditionOperator::NotEquals => text() != needle(),
        ConditionOperator::Contains => text().contains(&needle()),
        ConditionOperator::NotContains => !text().contains(&needle()),
        ConditionOperator::IsEmpty => actual.is_none_or(is_empty_value),
        ConditionOperator::IsNotEmpty => !actual.is_none_or(is_empty_value),
        ConditionOperator::GreaterThan => {
            let (a, b) = numbers();
            a > b
        }
        ConditionOperator::LessThan => {
            let (a, b) = numbers();
            a < b
        }
        ConditionOperator::GreaterOrEqual => {
            let (a, b) = numbers();
            a >= b
        }
        ConditionOperator::LessOrEqual => {
            let (a, b) = numbers();
            a <= b
        }
        ConditionOperator::Unknown(_) => true,
    }
}

/// JavaScript `Number()` coercion: missing is NaN, null and blank are 0.
fn js_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(f64::NAN),
        Some(_) => f64::NAN,
    }
}

/// Numeric when both sides are numbers, else case-insensitive text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    let (sa, sb) = (stringify(a), stringify(b));
    sa.to_lowercase()
        .cmp(&sb.to_lowercase())
        .then_with(|| sa.cmp(&sb))
}

fn group_key(value: &Value) -> String {
    match value {
        Value::Null => UNASSIGNED.to_string(),
        Value::String(s) if s.is_empty() => UNASSIGNED.to_string(),
        other => stringify(other),
    }
}
