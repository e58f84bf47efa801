//! Field type catalog.
//!
//! Every `FieldType` maps to a `FieldBehavior` holding its storage shape,
//! whether the system generates its value, and the functions that check,
//! default and display a value. The mapping is one exhaustive `match`, so a
//! new kind without a behavior fails to compile.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::ErrorKind;
use crate::types::{FieldDef, FieldType};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s\-+()]+$").expect("valid phone regex"));

/// Separator for MultiPicklist values stored as one string.
pub const MULTI_VALUE_SEPARATOR: char = ';';

const ADDRESS_PARTS: [&str; 5] = ["street", "city", "state", "postalCode", "country"];

/// How a kind's value is laid out in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShape {
    /// A single string, number or boolean
    Scalar,
    /// Several picklist values, semicolon-joined or as an array
    Set,
    /// A JSON object with named members
    Composite,
    /// The id of a record in another object
    Reference,
}

pub type CheckFn = fn(&FieldDef, &Value) -> Option<ErrorKind>;
pub type DefaultFn = fn(&FieldDef) -> Value;
pub type FormatFn = fn(&FieldDef, &Value) -> String;

/// Per-kind behavior table entry.
#[derive(Clone, Copy)]
pub struct FieldBehavior {
    pub shape: StorageShape,
    pub auto_generated: bool,
    /// Type-shape check for a non-empty value
    pub check: CheckFn,
    pub default_value: DefaultFn,
    pub format: FormatFn,
}

impl std::fmt::Debug for FieldBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBehavior")
            .field("shape", &self.shape)
            .field("auto_generated", &self.auto_generated)
            .finish_non_exhaustive()
    }
}

fn behavior(
    shape: StorageShape,
    check: CheckFn,
    default_value: DefaultFn,
    format: FormatFn,
) -> FieldBehavior {
    FieldBehavior {
        shape,
        auto_generated: false,
        check,
        default_value,
        format,
    }
}

fn generated(format: FormatFn) -> FieldBehavior {
    FieldBehavior {
        shape: StorageShape::Scalar,
        auto_generated: true,
        check: accept_any,
        default_value: null_default,
        format,
    }
}

impl FieldType {
    pub fn behavior(self) -> FieldBehavior {
        use StorageShape::*;
        match self {
            FieldType::Text | FieldType::LongText => {
                behavior(Scalar, check_text, null_default, format_plain)
            }
            FieldType::EncryptedText => behavior(Scalar, check_text, null_default, format_masked),
            FieldType::Email => behavior(Scalar, check_email, null_default, format_plain),
            FieldType::Phone => behavior(Scalar, check_phone, null_default, format_plain),
            FieldType::Url => behavior(Scalar, check_url, null_default, format_plain),
            FieldType::Number => behavior(Scalar, check_number, null_default, format_plain),
            FieldType::Currency => behavior(Scalar, check_number, null_default, format_currency),
            FieldType::Percent => behavior(Scalar, check_number, null_default, format_percent),
            FieldType::Date => behavior(Scalar, check_date, null_default, format_plain),
            FieldType::DateTime => behavior(Scalar, check_datetime, null_default, format_plain),
            FieldType::Time => behavior(Scalar, check_time, null_default, format_plain),
            FieldType::Checkbox => {
                behavior(Scalar, check_checkbox, checkbox_default, format_checkbox)
            }
            FieldType::Picklist => behavior(Scalar, check_picklist, null_default, format_plain),
            FieldType::MultiPicklist => {
                behavior(Set, check_multi_picklist, null_default, format_multi)
            }
            FieldType::Address => {
                behavior(Composite, check_address, address_default, format_address)
            }
            FieldType::Geolocation => {
                behavior(Composite, check_geolocation, null_default, format_geolocation)
            }
            FieldType::Lookup | FieldType::ExternalLookup => {
                behavior(Reference, check_reference, null_default, format_plain)
            }
            FieldType::AutoNumber | FieldType::Formula | FieldType::RollupSummary => {
                generated(format_plain)
            }
        }
    }
}

/// Type-shape check for a non-empty value of `field`.
pub fn check_value(field: &FieldDef, value: &Value) -> Option<ErrorKind> {
    (field.type_.behavior().check)(field, value)
}

/// Value a new record starts with; an explicit `defaultValue` wins.
pub fn default_value(field: &FieldDef) -> Value {
    match &field.default_value {
        Some(v) => v.clone(),
        None => (field.type_.behavior().default_value)(field),
    }
}

/// Human-readable rendering; empty values render as an empty string.
pub fn format_for_display(field: &FieldDef, value: &Value) -> String {
    if is_empty_value(value) {
        return String::new();
    }
    (field.type_.behavior().format)(field, value)
}

/// Null, blank strings, empty arrays and composites whose members are all
/// empty count as "no value".
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_empty_value),
        Value::Object(map) => map.values().all(is_empty_value),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Plain stringification used for comparisons, grouping and export.
///
/// Integral floats print without a fractional part so `200.0` and `200`
/// stringify the same way.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(&MULTI_VALUE_SEPARATOR.to_string()),
        Value::Object(_) => value.to_string(),
    }
}

/// Parse a value as a finite number: JSON numbers and numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Members of a multi-valued value: an array, or a semicolon-joined string.
pub fn multi_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(MULTI_VALUE_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![stringify(other)],
    }
}

/// Character count used for length limits.
pub fn text_length(value: &Value) -> usize {
    stringify(value).chars().count()
}

// --- checks ---

fn accept_any(_: &FieldDef, _: &Value) -> Option<ErrorKind> {
    None
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(stringify(value)),
        _ => None,
    }
}

fn check_text(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    as_text(value).is_none().then_some(ErrorKind::InvalidFormat)
}

fn check_pattern(value: &Value, accept: impl Fn(&str) -> bool) -> Option<ErrorKind> {
    match as_text(value) {
        Some(s) if accept(s.trim()) => None,
        _ => Some(ErrorKind::InvalidFormat),
    }
}

fn check_email(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    check_pattern(value, |s| EMAIL_RE.is_match(s))
}

fn check_phone(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    check_pattern(value, |s| PHONE_RE.is_match(s))
}

fn check_url(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    // url::Url only parses absolute URIs
    check_pattern(value, |s| url::Url::parse(s).is_ok())
}

fn check_number(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    as_number(value).is_none().then_some(ErrorKind::InvalidFormat)
}

fn check_date(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    check_pattern(value, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
}

fn check_datetime(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    check_pattern(value, |s| {
        DateTime::parse_from_rfc3339(s).is_ok()
            || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
            || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
    })
}

fn check_time(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    check_pattern(value, |s| {
        NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok()
            || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
    })
}

fn check_checkbox(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    match value {
        Value::Bool(_) => None,
        Value::String(s) if matches!(s.trim(), "true" | "false") => None,
        _ => Some(ErrorKind::InvalidFormat),
    }
}

fn check_picklist(field: &FieldDef, value: &Value) -> Option<ErrorKind> {
    let Some(s) = as_text(value) else {
        return Some(ErrorKind::InvalidFormat);
    };
    let allowed = field.picklist();
    if allowed.is_empty() || allowed.iter().any(|v| v == s.trim()) {
        None
    } else {
        Some(ErrorKind::InvalidFormat)
    }
}

fn check_multi_picklist(field: &FieldDef, value: &Value) -> Option<ErrorKind> {
    if !matches!(value, Value::String(_) | Value::Array(_)) {
        return Some(ErrorKind::InvalidFormat);
    }
    let allowed = field.picklist();
    if allowed.is_empty() {
        return None;
    }
    multi_values(value)
        .iter()
        .any(|member| !allowed.contains(member))
        .then_some(ErrorKind::InvalidFormat)
}

fn check_address(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    let Value::Object(map) = value else {
        return Some(ErrorKind::InvalidFormat);
    };
    map.values()
        .any(|v| !matches!(v, Value::String(_) | Value::Null))
        .then_some(ErrorKind::InvalidFormat)
}

fn check_geolocation(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    let Value::Object(map) = value else {
        return Some(ErrorKind::InvalidFormat);
    };
    let coordinate = |key: &str| map.get(key).and_then(as_number);
    let (Some(lat), Some(lon)) = (coordinate("latitude"), coordinate("longitude")) else {
        return Some(ErrorKind::InvalidFormat);
    };
    let in_range = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
    (!in_range).then_some(ErrorKind::OutOfRange)
}

fn check_reference(_: &FieldDef, value: &Value) -> Option<ErrorKind> {
    match value {
        Value::String(s) if !s.trim().is_empty() => None,
        _ => Some(ErrorKind::InvalidFormat),
    }
}

// --- defaults ---

fn null_default(_: &FieldDef) -> Value {
    Value::Null
}

fn checkbox_default(_: &FieldDef) -> Value {
    Value::Bool(false)
}

fn address_default(_: &FieldDef) -> Value {
    let map: Map<String, Value> = ADDRESS_PARTS
        .iter()
        .map(|part| (part.to_string(), json!("")))
        .collect();
    Value::Object(map)
}

// --- formatting ---

fn format_plain(_: &FieldDef, value: &Value) -> String {
    stringify(value)
}

fn format_masked(_: &FieldDef, value: &Value) -> String {
    let chars: Vec<char> = stringify(value).chars().collect();
    let visible = chars.len().saturating_sub(4);
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { *c })
        .collect()
}

fn format_currency(_: &FieldDef, value: &Value) -> String {
    match as_number(value) {
        Some(n) if n < 0.0 => format!("-${:.2}", n.abs()),
        Some(n) => format!("${n:.2}"),
        None => stringify(value),
    }
}

fn format_percent(_: &FieldDef, value: &Value) -> String {
    match as_number(value) {
        Some(n) => format!("{}%", stringify(&json!(n))),
        None => stringify(value),
    }
}

fn format_checkbox(_: &FieldDef, value: &Value) -> String {
    let checked = match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim() == "true",
        _ => false,
    };
    let label = if checked { "Yes" } else { "No" };
    label.to_string()
}

fn format_multi(_: &FieldDef, value: &Value) -> String {
    multi_values(value).join(", ")
}

fn format_address(_: &FieldDef, value: &Value) -> String {
    let Value::Object(map) = value else {
        return stringify(value);
    };
    ADDRESS_PARTS
        .iter()
        .filter_map(|part| map.get(*part))
        .map(stringify)
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_geolocation(_: &FieldDef, value: &Value) -> String {
    let Value::Object(map) = value else {
        return stringify(value);
    };
    let part = |key: &str| map.get(key).map(stringify).unwrap_or_default();
    format!("{}, {}", part("latitude"), part("longitude"))
}
