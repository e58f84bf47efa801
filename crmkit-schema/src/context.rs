//! SchemaContext: the on-disk registry of object definitions.
//!
//! Each ObjectDef lives in its own YAML file under `objects/`. The context
//! keeps an in-memory index by apiName and hands out immutable `Schema`
//! snapshots for the engines to read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::types::ObjectDef;

/// Object definitions written on first open when missing from disk.
pub struct SchemaDefaults {
    objects: Vec<ObjectDef>,
}

impl SchemaDefaults {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Add a default object definition.
    pub fn object(mut self, def: ObjectDef) -> Self {
        self.objects.push(def);
        self
    }

    pub fn objects(&self) -> &[ObjectDef] {
        &self.objects
    }
}

impl Default for SchemaDefaults {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SchemaContext`. Created by `SchemaContext::open()`.
pub struct SchemaContextBuilder {
    root: PathBuf,
    defaults: Option<SchemaDefaults>,
}

impl SchemaContextBuilder {
    /// Seed these objects on open; objects already on disk are preserved.
    pub fn with_defaults(mut self, defaults: SchemaDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Create directories, seed defaults, load from disk.
    pub async fn build(self) -> Result<SchemaContext> {
        let root = self.root;
        let objects_dir = root.join("objects");
        fs::create_dir_all(&objects_dir).await?;

        if let Some(defaults) = self.defaults {
            seed_defaults(&objects_dir, &defaults).await?;
        }

        let mut ctx = SchemaContext {
            root,
            objects: Vec::new(),
            index: HashMap::new(),
        };
        ctx.load_objects().await?;

        for issue in ctx.schema().check() {
            warn!(object = %issue.object, severity = ?issue.severity, "{}", issue.message);
        }
        debug!(objects = ctx.objects.len(), "schema context opened");

        Ok(ctx)
    }
}

/// Seed default objects by apiName; an existing file always wins.
async fn seed_defaults(objects_dir: &Path, defaults: &SchemaDefaults) -> Result<()> {
    for def in &defaults.objects {
        let path = object_path(objects_dir, &def.api_name);
        if !path.exists() {
            let yaml = serde_yaml::to_string(def)?;
            atomic_write(&path, yaml.as_bytes()).await?;
            debug!(api_name = %def.api_name, "seeded default object");
        }
    }
    Ok(())
}

fn object_path(objects_dir: &Path, api_name: &str) -> PathBuf {
    objects_dir.join(format!("{api_name}.yaml"))
}

/// Registry of object definitions backed by a directory:
/// ```text
/// schema/
///   objects/    ← one .yaml per ObjectDef
/// ```
pub struct SchemaContext {
    root: PathBuf,
    objects: Vec<ObjectDef>,
    index: HashMap<String, usize>,
}

impl SchemaContext {
    /// Open or create a schema directory.
    ///
    /// ```rust,ignore
    /// let ctx = SchemaContext::open(path)
    ///     .with_defaults(crm_defaults())
    ///     .build()
    ///     .await?;
    /// ```
    pub fn open(root: impl Into<PathBuf>) -> SchemaContextBuilder {
        SchemaContextBuilder {
            root: root.into(),
            defaults: None,
        }
    }

    pub fn get_object(&self, api_name: &str) -> Option<&ObjectDef> {
        self.index.get(api_name).map(|&i| &self.objects[i])
    }

    pub fn all_objects(&self) -> &[ObjectDef] {
        &self.objects
    }

    /// Immutable snapshot for the engines.
    pub fn schema(&self) -> Schema {
        Schema::new(self.objects.clone())
    }

    /// Write (create or update) an object definition. Persists immediately.
    pub async fn write_object(&mut self, def: &ObjectDef) -> Result<()> {
        let yaml = serde_yaml::to_string(def)?;
        atomic_write(&self.path_for(&def.api_name), yaml.as_bytes()).await?;

        if let Some(&idx) = self.index.get(&def.api_name) {
            self.objects[idx] = def.clone();
        } else {
            self.index.insert(def.api_name.clone(), self.objects.len());
            self.objects.push(def.clone());
        }
        debug!(api_name = %def.api_name, "object written");
        Ok(())
    }

    /// Add a new object definition; fails if the apiName is already taken.
    pub async fn create_object(&mut self, def: &ObjectDef) -> Result<()> {
        if self.index.contains_key(&def.api_name) {
            return Err(SchemaError::DuplicateObject {
                api_name: def.api_name.clone(),
            });
        }
        self.write_object(def).await
    }

    /// Delete an object definition by apiName.
    pub async fn delete_object(&mut self, api_name: &str) -> Result<ObjectDef> {
        let idx = self
            .index
            .get(api_name)
            .copied()
            .ok_or_else(|| SchemaError::ObjectNotFound {
                api_name: api_name.to_string(),
            })?;

        match fs::remove_file(self.path_for(api_name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.index.remove(api_name);

        // Swap-remove and fix the moved entry's index
        let removed = self.objects.swap_remove(idx);
        if idx < self.objects.len() {
            self.index.insert(self.objects[idx].api_name.clone(), idx);
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, api_name: &str) -> PathBuf {
        object_path(&self.root.join("objects"), api_name)
    }

    async fn load_objects(&mut self) -> Result<()> {
        let objects_dir = self.root.join("objects");
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&objects_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                paths.push(path);
            }
        }
        // Directory order is platform-dependent
        paths.sort();

        for path in paths {
            let content = fs::read_to_string(&path).await?;
            match serde_yaml::from_str::<ObjectDef>(&content) {
                Ok(def) if self.index.contains_key(&def.api_name) => {
                    warn!(?path, api_name = %def.api_name, "skipping duplicate object definition");
                }
                Ok(def) => {
                    self.index.insert(def.api_name.clone(), self.objects.len());
                    self.objects.push(def);
                }
                Err(e) => {
                    warn!(?path, %e, "skipping invalid object definition");
                }
            }
        }
        Ok(())
    }
}

/// Write to a temp file then rename for atomic persistence.
async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;
    let tmp = dir.join(format!(".tmp_{}", Ulid::new()));
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDef, FieldType};
    use tempfile::TempDir;

    fn account() -> ObjectDef {
        ObjectDef::new("Account", "Account")
            .with_field(FieldDef::new("name", "Name", FieldType::Text).required())
    }

    fn sample_defaults() -> SchemaDefaults {
        SchemaDefaults::new().object(account()).object(
            ObjectDef::new("Contact", "Contact")
                .with_field(FieldDef::new("email", "Email", FieldType::Email)),
        )
    }

    #[tokio::test]
    async fn open_creates_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("schema");
        let ctx = SchemaContext::open(&root).build().await.unwrap();
        assert!(root.join("objects").is_dir());
        assert!(ctx.all_objects().is_empty());
        assert!(ctx.schema().is_empty());
    }

    #[tokio::test]
    async fn write_and_read_object() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("schema");
        let mut ctx = SchemaContext::open(&root).build().await.unwrap();

        ctx.write_object(&account()).await.unwrap();
        assert_eq!(ctx.all_objects().len(), 1);
        assert!(ctx.get_object("Account").unwrap().field("name").is_some());
        assert!(root.join("objects/Account.yaml").exists());
    }

    #[tokio::test]
    async fn write_object_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = SchemaContext::open(tmp.path()).build().await.unwrap();

        let mut object = account();
        ctx.write_object(&object).await.unwrap();
        object.label = "Company".into();
        ctx.write_object(&object).await.unwrap();

        assert_eq!(ctx.all_objects().len(), 1);
        assert_eq!(ctx.get_object("Account").unwrap().label, "Company");
    }

    #[tokio::test]
    async fn delete_object_fixes_index() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = SchemaContext::open(tmp.path())
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();

        let removed = ctx.delete_object("Account").await.unwrap();
        assert_eq!(removed.api_name, "Account");
        assert!(ctx.get_object("Account").is_none());
        assert!(ctx.get_object("Contact").is_some());
        assert!(!tmp.path().join("objects/Account.yaml").exists());

        let err = ctx.delete_object("Account").await.unwrap_err();
        assert!(matches!(err, SchemaError::ObjectNotFound { .. }));

        let reopened = SchemaContext::open(tmp.path()).build().await.unwrap();
        assert!(reopened.get_object("Account").is_none());
        assert!(reopened.get_object("Contact").is_some());
    }

    #[tokio::test]
    async fn failed_file_removal_keeps_object() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = SchemaContext::open(tmp.path())
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();

        // A directory in place of the file cannot be removed with remove_file
        let path = tmp.path().join("objects/Account.yaml");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = ctx.delete_object("Account").await.unwrap_err();
        assert!(matches!(err, SchemaError::Io(_)));
        assert!(ctx.get_object("Account").is_some());
        assert_eq!(ctx.all_objects().len(), 2);
    }

    #[tokio::test]
    async fn delete_of_already_removed_file_succeeds() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = SchemaContext::open(tmp.path())
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();
        std::fs::remove_file(tmp.path().join("objects/Account.yaml")).unwrap();

        ctx.delete_object("Account").await.unwrap();
        assert!(ctx.get_object("Account").is_none());
    }

    #[tokio::test]
    async fn create_object_rejects_taken_api_name() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = SchemaContext::open(tmp.path()).build().await.unwrap();

        ctx.create_object(&account()).await.unwrap();
        let mut renamed = account();
        renamed.label = "Company".into();
        let err = ctx.create_object(&renamed).await.unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateObject { ref api_name } if api_name == "Account"));
        assert_eq!(err.to_string(), "duplicate object apiName: Account");
        assert_eq!(ctx.get_object("Account").unwrap().label, "Account");
    }

    #[tokio::test]
    async fn defaults_seeded_once_and_customizations_preserved() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("schema");

        let mut ctx = SchemaContext::open(&root)
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();
        assert_eq!(ctx.all_objects().len(), 2);

        let mut customized = ctx.get_object("Account").unwrap().clone();
        customized.plural_label = "Companies".into();
        ctx.write_object(&customized).await.unwrap();
        drop(ctx);

        let ctx = SchemaContext::open(&root)
            .with_defaults(sample_defaults())
            .build()
            .await
            .unwrap();
        assert_eq!(ctx.all_objects().len(), 2);
        assert_eq!(ctx.get_object("Account").unwrap().plural_label, "Companies");
    }

    #[tokio::test]
    async fn invalid_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("schema");
        std::fs::create_dir_all(root.join("objects")).unwrap();
        std::fs::write(root.join("objects/Broken.yaml"), "apiName: [not, a, string").unwrap();
        std::fs::write(root.join("objects/notes.txt"), "ignored").unwrap();
        std::fs::write(
            root.join("objects/Lead.yaml"),
            r#"
apiName: Lead
label: Lead
pluralLabel: Leads
fields:
  - apiName: company
    label: Company
    type: Text
    required: true
"#,
        )
        .unwrap();

        let ctx = SchemaContext::open(&root).build().await.unwrap();
        assert_eq!(ctx.all_objects().len(), 1);
        let lead = ctx.schema();
        assert!(lead.object("Lead").unwrap().field("company").unwrap().required);
    }
}
