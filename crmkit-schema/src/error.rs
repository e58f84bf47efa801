//! Error types for the schema registry, plus the field-level error taxonomy
//! shared by the validation, visibility and report engines.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors that can occur in schema registry operations
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Object definition not found by apiName
    #[error("object not found: {api_name}")]
    ObjectNotFound { api_name: String },

    /// Field definition not found on an object
    #[error("field not found: {object}.{field}")]
    FieldNotFound { object: String, field: String },

    /// Two objects share an apiName
    #[error("duplicate object apiName: {api_name}")]
    DuplicateObject { api_name: String },

    /// Two fields on one object share an apiName
    #[error("duplicate field apiName: {object}.{field}")]
    DuplicateField { object: String, field: String },

    /// A field cannot be removed while something still references it
    #[error("field {object}.{field} is still in use: {reason}")]
    FieldInUse {
        object: String,
        field: String,
        reason: String,
    },

    /// Integrity check failed
    #[error("invalid schema: {}", issues.join("; "))]
    InvalidSchema { issues: Vec<String> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Severity levels for error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorSeverity {
    /// Degraded, but the form or report still renders
    Warning,
    /// The value cannot be committed
    Error,
}

/// Trait for error types that have severity levels
pub trait Severity {
    fn severity(&self) -> ErrorSeverity;
}

/// Classification of a problem with a single field value or reference.
///
/// These are data, not errors: engines return them so callers can render
/// inline messages per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingRequiredField,
    InvalidFormat,
    OutOfRange,
    /// A read-only or auto-generated field was changed
    ReadOnlyViolation,
    /// Lookup target could not be found; the raw id is shown instead
    UnresolvedLookup,
    /// A report or layout names a field the object no longer defines
    UnknownField,
    /// A condition tree uses an operator or shape the evaluator does not know
    MalformedCondition,
}

impl Severity for ErrorKind {
    fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorKind::MissingRequiredField
            | ErrorKind::InvalidFormat
            | ErrorKind::OutOfRange
            | ErrorKind::ReadOnlyViolation => ErrorSeverity::Error,
            ErrorKind::UnresolvedLookup
            | ErrorKind::UnknownField
            | ErrorKind::MalformedCondition => ErrorSeverity::Warning,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::MissingRequiredField => "required field is missing",
            ErrorKind::InvalidFormat => "value has an invalid format",
            ErrorKind::OutOfRange => "value is out of range",
            ErrorKind::ReadOnlyViolation => "field is read-only",
            ErrorKind::UnresolvedLookup => "referenced record not found",
            ErrorKind::UnknownField => "unknown field",
            ErrorKind::MalformedCondition => "malformed condition",
        };
        f.write_str(text)
    }
}

/// A non-blocking problem found while rendering a form or running a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// The field, rule or condition the diagnostic is about
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn unknown_field(subject: impl Into<String>, context: &str) -> Self {
        let subject = subject.into();
        let message = format!("field '{subject}' is not defined on {context}");
        Self::new(ErrorKind::UnknownField, subject, message)
    }

    pub fn malformed_condition(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedCondition, subject, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}
