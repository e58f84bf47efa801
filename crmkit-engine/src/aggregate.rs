//! Report aggregates.
//!
//! Which fields get sums and averages is decided by an
//! `AggregateFieldStrategy`. The default, `MoneyLikeFields`, matches field
//! names against substrings such as `value` or `price`; saved reports rely
//! on exactly those matches, so it is kept as the default and can be
//! swapped per engine.

use crmkit_schema::catalog::as_number;
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::report::ProjectedRecord;

/// Decides which projected fields are aggregated.
pub trait AggregateFieldStrategy: Send + Sync {
    fn is_aggregate_field(&self, field: &str) -> bool;
}

impl<F> AggregateFieldStrategy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_aggregate_field(&self, field: &str) -> bool {
        self(field)
    }
}

/// Case-insensitive substring match on the field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyLikeFields {
    markers: Vec<String>,
}

impl MoneyLikeFields {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.money_field_markers)
    }
}

impl Default for MoneyLikeFields {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl AggregateFieldStrategy for MoneyLikeFields {
    fn is_aggregate_field(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.markers.iter().any(|m| field.contains(m.as_str()))
    }
}

/// Count over all rows; sums and averages for aggregate fields.
///
/// Averages divide by the number of rows holding a numeric value for that
/// field and are absent when there are none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregates {
    pub count: usize,
    pub sums: IndexMap<String, f64>,
    pub averages: IndexMap<String, f64>,
}

pub fn aggregate(rows: &[ProjectedRecord], strategy: &dyn AggregateFieldStrategy) -> Aggregates {
    let mut fields: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !fields.contains(&key.as_str()) && strategy.is_aggregate_field(key) {
                fields.push(key);
            }
        }
    }

    let mut out = Aggregates {
        count: rows.len(),
        ..Aggregates::default()
    };
    for field in fields {
        let numbers: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.get(field).and_then(as_number))
            .collect();
        let sum: f64 = numbers.iter().sum();
        out.sums.insert(field.to_string(), sum);
        if !numbers.is_empty() {
            out.averages
                .insert(field.to_string(), sum / numbers.len() as f64);
        }
    }
    out
}
