//! Validation of a record against the fields on one layout.
//!
//! Only fields placed on the layout are checked, and only while visible.
//! Per field the first failing check wins, in this order:
//!
//! 0. read-only: value differs from the baseline → `ReadOnlyViolation`
//! 1. required and empty → `MissingRequiredField`
//! 2. type shape (catalog check) → `InvalidFormat` / `OutOfRange`
//! 3. numeric `min`/`max` → `OutOfRange`
//! 4. `minLength`/`maxLength` → `OutOfRange`
//!
//! Auto-generated kinds skip 1-4 but are still read-only. Nothing here
//! mutates the record.

use std::collections::HashSet;

use crmkit_schema::catalog::{self, as_number, is_empty_value, text_length};
use crmkit_schema::{
    Diagnostic, ErrorKind, FieldDef, FieldLookup, PageLayout, Record, ValidationRule,
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::visibility::{evaluate, evaluate_detailed};

static NULL: Value = Value::Null;

/// An object-level rule whose condition held for the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleViolation {
    pub rule: String,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// First failing check per field, in layout order
    pub errors: IndexMap<String, ErrorKind>,
    pub rule_violations: Vec<RuleViolation>,
    /// Problems that were skipped rather than failed
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    /// Whether the record can be persisted.
    pub fn is_committable(&self) -> bool {
        self.errors.is_empty() && self.rule_violations.is_empty()
    }
}

/// Field-level errors for `record` on `layout`.
pub fn validate(
    layout: &PageLayout,
    record: &Record,
    fields: &impl FieldLookup,
) -> IndexMap<String, ErrorKind> {
    Validator::new(fields).validate(layout, record).errors
}

/// Checks 1-4 for one value of `field`.
pub fn validate_field(field: &FieldDef, value: &Value) -> Option<ErrorKind> {
    if field.type_.is_auto_generated() {
        return None;
    }
    if is_empty_value(value) {
        return field.required.then_some(ErrorKind::MissingRequiredField);
    }
    if let Some(kind) = catalog::check_value(field, value) {
        return Some(kind);
    }
    if let Some(n) = as_number(value).filter(|_| field.type_.is_numeric()) {
        let below = field.min.is_some_and(|min| n < min);
        let above = field.max.is_some_and(|max| n > max);
        if below || above {
            return Some(ErrorKind::OutOfRange);
        }
    }
    if field.min_length.is_some() || field.max_length.is_some() {
        let len = text_length(value);
        let short = field.min_length.is_some_and(|min| len < min);
        let long = field.max_length.is_some_and(|max| len > max);
        if short || long {
            return Some(ErrorKind::OutOfRange);
        }
    }
    None
}

/// Layout validator with an optional read-only baseline and object rules.
pub struct Validator<'a, L: FieldLookup> {
    fields: &'a L,
    baseline: Option<&'a Record>,
    rules: &'a [ValidationRule],
}

impl<'a, L: FieldLookup> Validator<'a, L> {
    pub fn new(fields: &'a L) -> Self {
        Self {
            fields,
            baseline: None,
            rules: &[],
        }
    }

    /// Values read-only fields must keep. Without one, read-only fields must be empty.
    pub fn with_baseline(mut self, baseline: &'a Record) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn with_rules(mut self, rules: &'a [ValidationRule]) -> Self {
        self.rules = rules;
        self
    }

    pub fn validate(&self, layout: &PageLayout, record: &Record) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut seen = HashSet::new();

        for tab in &layout.tabs {
            for section in &tab.sections {
                let shown = evaluate_detailed(section.visible_if.as_ref(), record);
                report.diagnostics.extend(shown.diagnostics);
                if !shown.visible {
                    continue;
                }

                for placed in &section.fields {
                    if !seen.insert(placed.api_name.as_str()) {
                        continue;
                    }
                    let Some(field) = self.fields.field(&placed.api_name) else {
                        report.diagnostics.push(Diagnostic::unknown_field(
                            &placed.api_name,
                            &format!("layout '{}'", layout.id),
                        ));
                        continue;
                    };

                    let shown = evaluate_detailed(field.visible_if.as_ref(), record);
                    report.diagnostics.extend(shown.diagnostics);
                    if !shown.visible {
                        continue;
                    }

                    if let Some(kind) = self.check(field, record) {
                        report.errors.insert(field.api_name.clone(), kind);
                    }
                }
            }
        }

        self.apply_rules(record, &mut report);

        for d in &report.diagnostics {
            warn!(layout = %layout.id, kind = %d.kind, subject = %d.subject, "{}", d.message);
        }
        debug!(
            layout = %layout.id,
            errors = report.errors.len(),
            rule_violations = report.rule_violations.len(),
            "record validated"
        );
        report
    }

    fn check(&self, field: &FieldDef, record: &Record) -> Option<ErrorKind> {
        let value = record.get(&field.api_name).unwrap_or(&NULL);
        if field.is_effectively_read_only() {
            let before = self
                .baseline
                .and_then(|b| b.get(&field.api_name))
                .unwrap_or(&NULL);
            if !same_value(before, value) {
                return Some(ErrorKind::ReadOnlyViolation);
            }
            // An unchanged read-only value was accepted when it was written
            return None;
        }
        validate_field(field, value)
    }

    fn apply_rules(&self, record: &Record, report: &mut ValidationReport) {
        for rule in self.rules.iter().filter(|r| r.active) {
            if !rule.condition.is_well_formed() {
                report.diagnostics.push(Diagnostic::malformed_condition(
                    &rule.name,
                    "validation rule condition is malformed; rule skipped",
                ));
                continue;
            }
            if evaluate(Some(&rule.condition), record) {
                report.rule_violations.push(RuleViolation {
                    rule: rule.name.clone(),
                    field: rule.error_field.clone(),
                    message: rule.error_message.clone(),
                });
            }
        }
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    (is_empty_value(a) && is_empty_value(b)) || a == b
}
