//! Error types for the engine

use crmkit_schema::{ErrorKind, SchemaError};
use crmkit_store::StoreError;
use indexmap::IndexMap;
use thiserror::Error;

use crate::validation::RuleViolation;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur committing records or loading engine state.
///
/// Evaluation, validation, lookup and report runs never fail with these;
/// they return their findings as data.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Object not found in the schema
    #[error("object not found: {api_name}")]
    ObjectNotFound { api_name: String },

    /// No layout of the requested kind applies
    #[error("no {layout_type} layout for object '{object}'")]
    LayoutNotFound { object: String, layout_type: String },

    /// Record not found
    #[error("record not found: {object}/{id}")]
    RecordNotFound { object: String, id: String },

    /// A record with this id is already stored
    #[error("record already exists: {object}/{id}")]
    RecordExists { object: String, id: String },

    /// Validation did not pass; nothing was written
    #[error("record failed validation: {}", summarize(.errors, .rules))]
    ValidationFailed {
        errors: IndexMap<String, ErrorKind>,
        rules: Vec<RuleViolation>,
    },

    /// Record store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Schema error
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}

fn summarize(errors: &IndexMap<String, ErrorKind>, rules: &[RuleViolation]) -> String {
    errors
        .iter()
        .map(|(field, kind)| format!("{field}: {kind}"))
        .chain(rules.iter().map(|r| format!("{}: {}", r.rule, r.message)))
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    pub fn object_not_found(api_name: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            api_name: api_name.into(),
        }
    }

    /// Field errors when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&IndexMap<String, ErrorKind>> {
        match self {
            Self::ValidationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }
}
