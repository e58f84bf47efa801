//! Engine configuration loaded with figment.
//!
//! Sources, later overriding earlier:
//! 1. Built-in defaults
//! 2. `crmkit.toml`, `crmkit.yaml`, `crmkit.json` in the base directory
//! 3. Environment variables prefixed `CRMKIT_` (e.g. `CRMKIT_LOG_FILTER=debug`)

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use crmkit_schema::{crm_defaults, SchemaContext};
use crmkit_store::FileRecordStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Result;

const FILE_STEM: &str = "crmkit";
const ENV_PREFIX: &str = "CRMKIT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the `SchemaContext` directory
    pub schema_dir: PathBuf,
    /// Root of the `FileRecordStore` directory
    pub records_dir: PathBuf,
    /// Substrings that mark a field as aggregate-eligible in reports
    pub money_field_markers: Vec<String>,
    /// `EnvFilter` directive for `init_tracing`
    pub log_filter: String,
    /// Actor stamped on records when the caller gives none
    pub default_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from(".crmkit/schema"),
            records_dir: PathBuf::from(".crmkit/records"),
            money_field_markers: ["value", "amount", "price", "budget", "revenue", "cost", "total"]
                .into_iter()
                .map(String::from)
                .collect(),
            log_filter: "info".to_string(),
            default_actor: "system".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the current working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load config files from `base`, then the environment.
    pub fn load_from(base: &Path) -> Result<Self> {
        let config = Self::figment(base).extract::<Self>()?;
        debug!(schema_dir = ?config.schema_dir, records_dir = ?config.records_dir, "engine config loaded");
        Ok(config)
    }

    /// Install the global subscriber with `log_filter`. See `logging::init_tracing`.
    pub fn init_tracing(&self) -> bool {
        crate::logging::init_tracing(&self.log_filter)
    }

    /// Open the schema directory, seeding the stock CRM objects on first use.
    pub async fn open_schema(&self) -> Result<SchemaContext> {
        let ctx = SchemaContext::open(&self.schema_dir)
            .with_defaults(crm_defaults())
            .build()
            .await?;
        Ok(ctx)
    }

    pub fn record_store(&self) -> FileRecordStore {
        FileRecordStore::new(&self.records_dir)
    }

    fn figment(base: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        for ext in ["toml", "yaml", "json"] {
            let path = base.join(format!("{FILE_STEM}.{ext}"));
            if !path.exists() {
                continue;
            }
            trace!(path = %path.display(), "loading config file");
            figment = match ext {
                "toml" => figment.merge(Toml::file(path)),
                "yaml" => figment.merge(Yaml::file(path)),
                _ => figment.merge(Json::file(path)),
            };
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn defaults_without_files() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::load_from(temp.path()).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.money_field_markers.contains(&"price".to_string()));
    }

    #[test]
    #[serial]
    fn toml_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("crmkit.toml"),
            r#"
records_dir = "/var/lib/crm/records"
money_field_markers = ["fee"]
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(temp.path()).unwrap();
        assert_eq!(config.records_dir, PathBuf::from("/var/lib/crm/records"));
        assert_eq!(config.money_field_markers, ["fee"]);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    #[serial]
    fn yaml_overrides_toml_and_env_overrides_both() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("crmkit.toml"), "default_actor = \"toml\"\n").unwrap();
        std::fs::write(
            temp.path().join("crmkit.yaml"),
            "default_actor: yaml\nlog_filter: warn\n",
        )
        .unwrap();

        let config = EngineConfig::load_from(temp.path()).unwrap();
        assert_eq!(config.default_actor, "yaml");

        std::env::set_var("CRMKIT_LOG_FILTER", "debug");
        let config = EngineConfig::load_from(temp.path());
        std::env::remove_var("CRMKIT_LOG_FILTER");
        assert_eq!(config.unwrap().log_filter, "debug");
    }

    #[tokio::test]
    #[serial]
    async fn directories_come_from_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("crmkit.yaml"),
            format!(
                "schema_dir: {}\nrecords_dir: {}\n",
                temp.path().join("meta").display(),
                temp.path().join("data").display()
            ),
        )
        .unwrap();
        let config = EngineConfig::load_from(temp.path()).unwrap();

        let ctx = config.open_schema().await.unwrap();
        assert!(ctx.get_object("Account").is_some());
        assert!(temp.path().join("meta/objects/Account.yaml").exists());
        assert_eq!(config.record_store().root(), temp.path().join("data"));
    }

    #[test]
    #[serial]
    fn malformed_file_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("crmkit.json"), "{ not json").unwrap();
        let err = EngineConfig::load_from(temp.path()).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Config(_)));
    }
}
