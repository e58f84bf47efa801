//! Metadata-driven engines for CrmKit
//!
//! Every engine reads the same `crmkit-schema` metadata and works on plain
//! `Record`s. Evaluation never panics and never fails on bad metadata:
//! problems come back as `Diagnostic`s next to the result.
//!
//! - [`visibility`]: condition trees over record values
//! - [`validation`]: per-field checks and object rules against a layout
//! - [`layout`]: sections as ordered row/column grids
//! - [`lookup`]: human-readable labels for lookup targets
//! - [`report`]: filter, sort, group and project, with [`aggregate`] and [`export`]
//! - [`commit`]: the validated write path over a `RecordStore`
//!
//! ```no_run
//! use crmkit_engine::{EngineConfig, RecordService};
//! use crmkit_schema::{crm_defaults, Record, Schema};
//! use crmkit_store::MemoryRecordStore;
//!
//! # async fn demo() -> crmkit_engine::Result<()> {
//! let config = EngineConfig::load()?;
//! let schema = Schema::new(crm_defaults().objects().to_vec());
//! let service = RecordService::from_config(schema, MemoryRecordStore::new(), &config);
//! let account = service
//!     .create("Account", Record::default().with("accountName", "Acme"))
//!     .await?;
//! assert_eq!(account.get("accountNumber"), Some(&serde_json::json!("ACC-0001")));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod commit;
pub mod config;
pub mod error;
pub mod export;
pub mod layout;
pub mod logging;
pub mod lookup;
pub mod report;
pub mod validation;
pub mod visibility;

pub use aggregate::{AggregateFieldStrategy, Aggregates, MoneyLikeFields};
pub use commit::{error_map, RecordService};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use export::{parse_delimited, to_delimited};
pub use layout::{compose, compose_visible, ComposedForm, GridCell, OrderedSectionGrid};
pub use logging::{init_tracing, Pretty};
pub use lookup::{LabelResolver, LabelRule, ResolvedLabels};
pub use report::{
    FilterCondition, ProjectedRecord, ReportEngine, ReportSpec, RunResult, SortOrder, UNASSIGNED,
};
pub use validation::{validate, validate_field, RuleViolation, ValidationReport, Validator};
pub use visibility::{evaluate, evaluate_detailed, Evaluation};
