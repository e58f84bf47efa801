//! Visibility rule evaluation.
//!
//! `evaluate` decides whether a field or section is shown for a record
//! snapshot. It is stateless: callers re-invoke it when any of the
//! condition's `dependencies()` change.
//!
//! Missing fields read as empty. Groups short-circuit left to right.
//! A node the evaluator does not understand (unknown operator, unknown
//! combinator, leaf without a field) evaluates to `true` and is reported as
//! a `MalformedCondition` diagnostic by `evaluate_detailed`.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use crmkit_schema::catalog::{as_number, is_empty_value, multi_values, stringify};
use crmkit_schema::{
    BoolOp, ConditionNode, ConditionOperator, Diagnostic, FieldDef, FieldLookup, Record, Section,
};
use serde_json::Value;

static NULL: Value = Value::Null;

/// Outcome of evaluating one condition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub visible: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Whether `condition` holds for `record`. An absent condition is always visible.
pub fn evaluate(condition: Option<&ConditionNode>, record: &Record) -> bool {
    match condition {
        None => true,
        Some(node) => eval(node, record, &mut Vec::new()),
    }
}

/// Like `evaluate`, also returning diagnostics for nodes that were treated as `true`.
pub fn evaluate_detailed(condition: Option<&ConditionNode>, record: &Record) -> Evaluation {
    let mut diagnostics = Vec::new();
    let visible = match condition {
        None => true,
        Some(node) => eval(node, record, &mut diagnostics),
    };
    Evaluation {
        visible,
        diagnostics,
    }
}

pub fn is_field_visible(field: &FieldDef, record: &Record) -> bool {
    evaluate(field.visible_if.as_ref(), record)
}

pub fn is_section_visible(section: &Section, record: &Record) -> bool {
    evaluate(section.visible_if.as_ref(), record)
}

/// Static check of a condition against an object's fields.
///
/// Reports every malformed node and every leaf that names a field the
/// object does not define. Unlike evaluation, nothing is short-circuited.
pub fn lint_condition(
    condition: &ConditionNode,
    subject: &str,
    fields: &impl FieldLookup,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    lint(condition, subject, fields, &mut out);
    out
}

fn lint(node: &ConditionNode, subject: &str, fields: &impl FieldLookup, out: &mut Vec<Diagnostic>) {
    match node {
        ConditionNode::Group { op, children } => {
            if let BoolOp::Unknown(op) = op {
                out.push(Diagnostic::malformed_condition(
                    subject,
                    format!("unknown combinator '{op}'"),
                ));
            }
            for child in children {
                lint(child, subject, fields, out);
            }
        }
        ConditionNode::Leaf {
            field, operator, ..
        } => {
            if let Some(d) = leaf_problem(field, operator, subject) {
                out.push(d);
            } else if fields.field(field).is_none() {
                out.push(Diagnostic::malformed_condition(
                    subject,
                    format!("condition references unknown field '{field}'"),
                ));
            }
        }
        ConditionNode::Malformed(raw) => out.push(unrecognized(subject, raw)),
    }
}

fn unrecognized(subject: &str, raw: &Value) -> Diagnostic {
    Diagnostic::malformed_condition(subject, format!("unrecognized condition node {raw}"))
}

fn leaf_problem(field: &str, operator: &ConditionOperator, subject: &str) -> Option<Diagnostic> {
    if field.trim().is_empty() {
        return Some(Diagnostic::malformed_condition(
            subject,
            "condition leaf has no field",
        ));
    }
    if let ConditionOperator::Unknown(op) = operator {
        return Some(Diagnostic::malformed_condition(
            subject,
            format!("unknown operator '{op}' on field '{field}'"),
        ));
    }
    None
}

fn eval(node: &ConditionNode, record: &Record, diagnostics: &mut Vec<Diagnostic>) -> bool {
    match node {
        ConditionNode::Group { op, children } => match op {
            BoolOp::Unknown(name) => {
                diagnostics.push(Diagnostic::malformed_condition(
                    name.as_str(),
                    format!("unknown combinator '{name}'"),
                ));
                true
            }
            // An empty group places no constraint
            _ if children.is_empty() => true,
            BoolOp::And => children.iter().all(|c| eval(c, record, diagnostics)),
            BoolOp::Or => children.iter().any(|c| eval(c, record, diagnostics)),
        },
        ConditionNode::Leaf {
            field,
            operator,
            value,
        } => {
            if let Some(d) = leaf_problem(field, operator, field) {
                diagnostics.push(d);
                return true;
            }
            let actual = record.get(field).unwrap_or(&NULL);
            apply(operator, actual, value)
        }
        ConditionNode::Malformed(raw) => {
            diagnostics.push(unrecognized("condition", raw));
            true
        }
    }
}

/// Apply a known leaf operator.
pub(crate) fn apply(operator: &ConditionOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => equals(actual, expected),
        ConditionOperator::NotEquals => !equals(actual, expected),
        ConditionOperator::IsEmpty => is_empty_value(actual),
        ConditionOperator::IsNotEmpty => !is_empty_value(actual),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::NotContains => !contains(actual, expected),
        ConditionOperator::GreaterThan => compare(actual, expected) == Some(Ordering::Greater),
        ConditionOperator::LessThan => compare(actual, expected) == Some(Ordering::Less),
        ConditionOperator::GreaterOrEqual => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ConditionOperator::LessOrEqual => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ConditionOperator::Unknown(_) => true,
    }
}

fn equals(actual: &Value, expected: &Value) -> bool {
    if is_empty_value(actual) {
        return is_empty_value(expected);
    }
    stringify(actual) == stringify(expected)
}

/// Membership for multi-valued fields, substring for plain text.
fn contains(actual: &Value, expected: &Value) -> bool {
    let needle = stringify(expected);
    match actual {
        Value::Array(_) => multi_values(actual).contains(&needle),
        Value::String(s) if s.contains(crmkit_schema::catalog::MULTI_VALUE_SEPARATOR) => {
            multi_values(actual).contains(&needle)
        }
        Value::String(s) => !needle.is_empty() && s.contains(&needle),
        _ => false,
    }
}

/// Numeric when both sides are numbers, else chronological when both are dates.
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a.partial_cmp(&b);
    }
    let a = as_instant(actual)?;
    let b = as_instant(expected)?;
    Some(a.cmp(&b))
}

fn as_instant(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmkit_schema::{ErrorKind, FieldType, ObjectDef};
    use serde_json::json;

    fn status_active() -> ConditionNode {
        ConditionNode::leaf("status", "equals", "Active")
    }

    #[test]
    fn absent_condition_is_visible() {
        assert!(evaluate(None, &Record::default()));
        assert!(evaluate(None, &Record::new("r1").with("status", "Inactive")));
    }

    #[test]
    fn equals_on_status() {
        let cond = status_active();
        assert!(evaluate(Some(&cond), &Record::new("r").with("status", "Active")));
        assert!(!evaluate(Some(&cond), &Record::new("r").with("status", "Inactive")));
        assert!(!evaluate(Some(&cond), &Record::new("r")));
    }

    #[test]
    fn equals_compares_numbers_and_booleans_by_text() {
        let record = Record::new("r").with("count", 3).with("flag", true);
        assert!(evaluate(Some(&ConditionNode::leaf("count", "equals", "3")), &record));
        assert!(evaluate(Some(&ConditionNode::leaf("flag", "equals", true)), &record));
        assert!(evaluate(
            Some(&ConditionNode::leaf("flag", "notEquals", false)),
            &record
        ));
    }

    #[test]
    fn missing_values_are_empty() {
        let record = Record::new("r").with("notes", "   ");
        assert!(evaluate(
            Some(&ConditionNode::leaf("notes", "isEmpty", json!(null))),
            &record
        ));
        assert!(evaluate(
            Some(&ConditionNode::leaf("missing", "isEmpty", json!(null))),
            &record
        ));
        assert!(!evaluate(
            Some(&ConditionNode::leaf("missing", "isNotEmpty", json!(null))),
            &record
        ));
        assert!(evaluate(
            Some(&ConditionNode::leaf("missing", "notEquals", "x")),
            &record
        ));
    }

    #[test]
    fn contains_on_multi_valued_and_text() {
        let record = Record::new("r")
            .with("channels", "Email;SMS")
            .with("tags", json!(["vip", "partner"]))
            .with("notes", "call back Monday");

        let check = |field: &str, needle: &str| {
            evaluate(Some(&ConditionNode::leaf(field, "contains", needle)), &record)
        };
        assert!(check("channels", "SMS"));
        assert!(!check("channels", "Ema"));
        assert!(check("tags", "vip"));
        assert!(!check("tags", "vi"));
        assert!(check("notes", "back"));
        assert!(!check("missing", "x"));
    }

    #[test]
    fn ordering_on_numbers_and_dates() {
        let record = Record::new("r")
            .with("amount", 250)
            .with("closeDate", "2024-03-01");
        let gt = |field: &str, v: Value| {
            evaluate(Some(&ConditionNode::leaf(field, "greaterThan", v)), &record)
        };
        assert!(gt("amount", json!(100)));
        assert!(gt("amount", json!("99.5")));
        assert!(!gt("amount", json!(250)));
        assert!(gt("closeDate", json!("2024-02-28")));
        assert!(!gt("closeDate", json!("2024-03-01T10:00:00Z")));
        assert!(!gt("missing", json!(1)));
        assert!(evaluate(
            Some(&ConditionNode::leaf("amount", "lessOrEqual", 250)),
            &record
        ));
    }

    #[test]
    fn groups_short_circuit() {
        let record = Record::new("r").with("status", "Active");
        // The unknown operator after a false AND child is never reached
        let and = ConditionNode::and(vec![
            ConditionNode::leaf("status", "equals", "Closed"),
            ConditionNode::leaf("status", "bogus", "x"),
        ]);
        let eval = evaluate_detailed(Some(&and), &record);
        assert!(!eval.visible);
        assert!(eval.diagnostics.is_empty());

        let or = ConditionNode::or(vec![
            status_active(),
            ConditionNode::leaf("status", "bogus", "x"),
        ]);
        let eval = evaluate_detailed(Some(&or), &record);
        assert!(eval.visible);
        assert!(eval.diagnostics.is_empty());
    }

    #[test]
    fn malformed_nodes_evaluate_true_with_diagnostic() {
        let record = Record::new("r");
        let cond = ConditionNode::leaf("status", "startsWith", "A");
        let eval = evaluate_detailed(Some(&cond), &record);
        assert!(eval.visible);
        assert_eq!(eval.diagnostics.len(), 1);
        assert!(eval.diagnostics[0].message.contains("startsWith"));

        let group: ConditionNode =
            serde_json::from_value(json!({"op": "XOR", "children": [{"field": "a", "operator": "isEmpty"}]}))
                .unwrap();
        let eval = evaluate_detailed(Some(&group), &record);
        assert!(eval.visible);
        assert_eq!(eval.diagnostics.len(), 1);
    }

    #[test]
    fn empty_group_is_visible() {
        assert!(evaluate(Some(&ConditionNode::or(vec![])), &Record::default()));
        assert!(evaluate(Some(&ConditionNode::and(vec![])), &Record::default()));
    }

    #[test]
    fn empty_group_with_unknown_combinator_is_reported() {
        let group = ConditionNode::Group {
            op: BoolOp::from("XOR".to_string()),
            children: vec![],
        };
        let eval = evaluate_detailed(Some(&group), &Record::default());
        assert!(eval.visible);
        assert_eq!(eval.diagnostics.len(), 1);
        assert_eq!(eval.diagnostics[0].kind, ErrorKind::MalformedCondition);
    }

    #[test]
    fn unrecognized_node_is_visible_with_diagnostic() {
        let field: FieldDef = serde_yaml::from_str(
            r#"
apiName: lossReason
label: Loss Reason
type: LongText
visibleIf: { field: stage, value: x }
"#,
        )
        .unwrap();
        let eval = evaluate_detailed(field.visible_if.as_ref(), &Record::new("d"));
        assert!(eval.visible);
        assert_eq!(eval.diagnostics.len(), 1);
        assert_eq!(eval.diagnostics[0].kind, ErrorKind::MalformedCondition);

        let object = ObjectDef::new("Deal", "Deal").with_field(field.clone());
        let diags = lint_condition(field.visible_if.as_ref().unwrap(), "lossReason", &object);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn lint_reports_unknown_fields_and_operators() {
        let object = ObjectDef::new("Deal", "Deal")
            .with_field(FieldDef::new("stage", "Stage", FieldType::Picklist));
        let cond = ConditionNode::and(vec![
            ConditionNode::leaf("stage", "equals", "Won"),
            ConditionNode::leaf("stag", "equals", "Won"),
            ConditionNode::leaf("stage", "like", "W%"),
        ]);
        let diags = lint_condition(&cond, "lossReason", &object);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.subject == "lossReason"));
    }

    #[test]
    fn field_and_section_helpers() {
        let field = FieldDef::new("lossReason", "Loss Reason", FieldType::LongText)
            .with_visible_if(ConditionNode::leaf("stage", "equals", "Closed Lost"));
        let lost = Record::new("d").with("stage", "Closed Lost");
        assert!(is_field_visible(&field, &lost));
        assert!(!is_field_visible(&field, &Record::new("d")));

        let mut section = Section::new("Outcome", 0, 1);
        assert!(is_section_visible(&section, &Record::new("d")));
        section.visible_if = Some(ConditionNode::leaf("stage", "isNotEmpty", json!(null)));
        assert!(!is_section_visible(&section, &Record::new("d")));
    }
}
