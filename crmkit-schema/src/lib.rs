//! Object, field, layout and record metadata
//!
//! `crmkit-schema` is the shared substrate of CrmKit: pure data describing
//! user-defined objects and the records stored against them. It holds no
//! engine behavior beyond lookup helpers, the field type catalog and
//! integrity checks.
//!
//! # Architecture
//!
//! - **Catalog**: one behavior entry per field kind (shape, check, default, display)
//! - **Model**: ObjectDef → FieldDef / PageLayout / RecordType / ValidationRule
//! - **Conditions**: JSON-compatible boolean trees for visibility and rules
//! - **YAML on disk**: `SchemaContext` keeps one `.yaml` file per object

pub mod catalog;
pub mod condition;
pub mod context;
pub mod defaults;
pub mod error;
pub mod record;
pub mod schema;
pub mod types;

pub use catalog::{FieldBehavior, StorageShape};
pub use condition::{BoolOp, ConditionNode, ConditionOperator};
pub use context::{SchemaContext, SchemaContextBuilder, SchemaDefaults};
pub use defaults::crm_defaults;
pub use error::{Diagnostic, ErrorKind, ErrorSeverity, Result, SchemaError, Severity};
pub use record::Record;
pub use schema::{FieldLookup, Schema, SchemaIssue};
pub use types::{
    FieldDef, FieldType, LayoutField, LayoutType, ObjectDef, PageLayout, RecordType, Section, Tab,
    ValidationRule,
};
