//! Logging helpers

use serde::Serialize;
use std::fmt::Debug;
use tracing_subscriber::EnvFilter;

/// Renders a value as YAML inside a log line.
///
/// ```ignore
/// debug!("report spec: {}", Pretty(&spec));
/// ```
///
/// Falls back to `{:#?}` when the value cannot be serialized.
pub struct Pretty<T>(pub T);

impl<T: Serialize + Debug> std::fmt::Display for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_yaml::to_string(&self.0) {
            Ok(yaml) => write!(f, "\n{}", yaml),
            Err(_) => write!(f, "\n{:#?}", self.0),
        }
    }
}

impl<T: Serialize + Debug> std::fmt::Debug for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`, or `filter` when unset.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmkit_schema::ConditionNode;

    #[test]
    fn pretty_renders_yaml_with_leading_newline() {
        let node = ConditionNode::leaf("status", "equals", "Active");
        let out = Pretty(&node).to_string();
        assert!(out.starts_with('\n'));
        assert!(out.contains("field: status"));
        assert!(out.contains("operator: equals"));
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing("warn");
        assert!(!init_tracing("warn"));
    }
}
