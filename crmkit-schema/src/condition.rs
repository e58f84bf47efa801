//! Visibility and rule condition trees.
//!
//! A condition is either a leaf comparing one record field against a value,
//! or a boolean group combining child conditions. Trees serialize to plain
//! JSON/YAML objects so they can be stored alongside field and section
//! definitions:
//!
//! ```text
//! leaf:  { field: status, operator: equals, value: Active }
//! group: { op: AND, children: [ ... ] }
//! ```
//!
//! Unknown operators deserialize successfully and are carried as
//! `Unknown(..)` so the evaluator can report them instead of failing the
//! whole schema load.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by a leaf condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    IsEmpty,
    IsNotEmpty,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Unknown(String),
}

impl ConditionOperator {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "notEquals",
            ConditionOperator::IsEmpty => "isEmpty",
            ConditionOperator::IsNotEmpty => "isNotEmpty",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "notContains",
            ConditionOperator::GreaterThan => "greaterThan",
            ConditionOperator::LessThan => "lessThan",
            ConditionOperator::GreaterOrEqual => "greaterOrEqual",
            ConditionOperator::LessOrEqual => "lessOrEqual",
            ConditionOperator::Unknown(s) => s,
        }
    }

    /// Whether the operator ignores the leaf's `value`.
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty
        )
    }
}

impl From<String> for ConditionOperator {
    fn from(s: String) -> Self {
        const KNOWN: [ConditionOperator; 10] = [
            ConditionOperator::Equals,
            ConditionOperator::NotEquals,
            ConditionOperator::IsEmpty,
            ConditionOperator::IsNotEmpty,
            ConditionOperator::Contains,
            ConditionOperator::NotContains,
            ConditionOperator::GreaterThan,
            ConditionOperator::LessThan,
            ConditionOperator::GreaterOrEqual,
            ConditionOperator::LessOrEqual,
        ];
        KNOWN
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(ConditionOperator::Unknown(s))
    }
}

impl From<&str> for ConditionOperator {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ConditionOperator> for String {
    fn from(op: ConditionOperator) -> Self {
        op.as_str().to_string()
    }
}

/// Boolean combinator for a group node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BoolOp {
    And,
    Or,
    Unknown(String),
}

impl From<String> for BoolOp {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => BoolOp::And,
            "OR" => BoolOp::Or,
            _ => BoolOp::Unknown(s),
        }
    }
}

impl From<BoolOp> for String {
    fn from(op: BoolOp) -> Self {
        match op {
            BoolOp::And => "AND".into(),
            BoolOp::Or => "OR".into(),
            BoolOp::Unknown(s) => s,
        }
    }
}

/// A node in a condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    Group {
        op: BoolOp,
        #[serde(default)]
        children: Vec<ConditionNode>,
    },
    Leaf {
        field: String,
        operator: ConditionOperator,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        value: Value,
    },
    /// Any other shape, kept as written.
    Malformed(Value),
}

impl ConditionNode {
    pub fn leaf(
        field: impl Into<String>,
        operator: impl Into<ConditionOperator>,
        value: impl Into<Value>,
    ) -> Self {
        ConditionNode::Leaf {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Group {
            op: BoolOp::And,
            children,
        }
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Group {
            op: BoolOp::Or,
            children,
        }
    }

    /// True when every node uses a known operator and every leaf names a field.
    pub fn is_well_formed(&self) -> bool {
        match self {
            ConditionNode::Group { op, children } => {
                !matches!(op, BoolOp::Unknown(_)) && children.iter().all(Self::is_well_formed)
            }
            ConditionNode::Leaf {
                field, operator, ..
            } => !field.trim().is_empty() && !matches!(operator, ConditionOperator::Unknown(_)),
            ConditionNode::Malformed(_) => false,
        }
    }

    /// Field apiNames the condition reads, in first-reference order.
    ///
    /// Callers re-evaluate visibility when any of these change.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_dependencies(&mut out);
        out
    }

    fn collect_dependencies<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ConditionNode::Group { children, .. } => {
                for child in children {
                    child.collect_dependencies(out);
                }
            }
            ConditionNode::Leaf { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            ConditionNode::Malformed(_) => {}
        }
    }
}
