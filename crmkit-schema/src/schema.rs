//! The schema: every ObjectDef, indexed by apiName, plus integrity checks.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorSeverity, Result, SchemaError};
use crate::types::{FieldDef, FieldType, ObjectDef};

/// Anything that can resolve a field definition by apiName.
pub trait FieldLookup {
    fn field(&self, api_name: &str) -> Option<&FieldDef>;
}

impl FieldLookup for ObjectDef {
    fn field(&self, api_name: &str) -> Option<&FieldDef> {
        ObjectDef::field(self, api_name)
    }
}

impl FieldLookup for HashMap<String, FieldDef> {
    fn field(&self, api_name: &str) -> Option<&FieldDef> {
        self.get(api_name)
    }
}

impl FieldLookup for [FieldDef] {
    fn field(&self, api_name: &str) -> Option<&FieldDef> {
        self.iter().find(|f| f.api_name == api_name)
    }
}

impl<T: FieldLookup + ?Sized> FieldLookup for &T {
    fn field(&self, api_name: &str) -> Option<&FieldDef> {
        (**self).field(api_name)
    }
}

/// A problem found by `Schema::check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub object: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl SchemaIssue {
    fn error(object: &str, message: String) -> Self {
        Self {
            object: object.to_string(),
            message,
            severity: ErrorSeverity::Error,
        }
    }

    fn warning(object: &str, message: String) -> Self {
        Self {
            object: object.to_string(),
            message,
            severity: ErrorSeverity::Warning,
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.object, self.message)
    }
}

/// All object definitions of one tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "SchemaFile", into = "SchemaFile")]
pub struct Schema {
    objects: Vec<ObjectDef>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    objects: Vec<ObjectDef>,
}

impl From<SchemaFile> for Schema {
    fn from(file: SchemaFile) -> Self {
        Schema::new(file.objects)
    }
}

impl From<Schema> for SchemaFile {
    fn from(schema: Schema) -> Self {
        SchemaFile {
            objects: schema.objects,
        }
    }
}

impl Schema {
    /// Build a schema. On duplicate apiNames the first definition is indexed;
    /// `check()` reports the duplicate.
    pub fn new(objects: Vec<ObjectDef>) -> Self {
        let mut index = HashMap::new();
        for (i, object) in objects.iter().enumerate() {
            index.entry(object.api_name.clone()).or_insert(i);
        }
        Self { objects, index }
    }

    pub fn object(&self, api_name: &str) -> Option<&ObjectDef> {
        self.index.get(api_name).map(|&i| &self.objects[i])
    }

    pub fn require_object(&self, api_name: &str) -> Result<&ObjectDef> {
        self.object(api_name)
            .ok_or_else(|| SchemaError::ObjectNotFound {
                api_name: api_name.to_string(),
            })
    }

    pub fn objects(&self) -> &[ObjectDef] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Run every integrity check and return the problems found.
    pub fn check(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for object in &self.objects {
            if !seen.insert(object.api_name.as_str()) {
                issues.push(SchemaIssue::error(
                    &object.api_name,
                    "duplicate object apiName".into(),
                ));
            }
            self.check_object(object, &mut issues);
        }
        issues
    }

    /// Return the schema if `check()` finds no error-severity issues.
    pub fn validated(self) -> Result<Self> {
        let errors: Vec<String> = self
            .check()
            .into_iter()
            .filter(|i| i.severity == ErrorSeverity::Error)
            .map(|i| i.to_string())
            .collect();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(SchemaError::InvalidSchema { issues: errors })
        }
    }

    fn check_object(&self, object: &ObjectDef, issues: &mut Vec<SchemaIssue>) {
        let name = object.api_name.as_str();

        let mut field_names = HashSet::new();
        for field in &object.fields {
            if !field_names.insert(field.api_name.as_str()) {
                issues.push(SchemaIssue::error(
                    name,
                    format!("duplicate field apiName '{}'", field.api_name),
                ));
            }
            self.check_field(name, field, issues);
        }

        if let Some(default_id) = &object.default_record_type_id {
            if object.record_type(default_id).is_none() {
                issues.push(SchemaIssue::error(
                    name,
                    format!("defaultRecordTypeId '{default_id}' does not match a record type"),
                ));
            }
        }
        for record_type in &object.record_types {
            if object.layout(&record_type.page_layout_id).is_none() {
                issues.push(SchemaIssue::error(
                    name,
                    format!(
                        "record type '{}' points at missing layout '{}'",
                        record_type.id, record_type.page_layout_id
                    ),
                ));
            }
        }

        for layout in &object.page_layouts {
            for section in layout.tabs.iter().flat_map(|t| t.sections.iter()) {
                if !(1..=3).contains(&section.columns) {
                    issues.push(SchemaIssue::error(
                        name,
                        format!(
                            "section '{}' on layout '{}' has {} columns (1-3 allowed)",
                            section.label, layout.id, section.columns
                        ),
                    ));
                }
                let columns = section.effective_columns();
                let mut cells = HashMap::new();
                for lf in &section.fields {
                    if object.field(&lf.api_name).is_none() {
                        issues.push(SchemaIssue::warning(
                            name,
                            format!(
                                "layout '{}' places unknown field '{}'",
                                layout.id, lf.api_name
                            ),
                        ));
                    }
                    let cell = (lf.order / columns, lf.column.unwrap_or(lf.order % columns));
                    if let Some(other) = cells.insert(cell, lf.api_name.as_str()) {
                        issues.push(SchemaIssue::error(
                            name,
                            format!(
                                "fields '{}' and '{}' share row {} column {} in section '{}'",
                                other, lf.api_name, cell.0, cell.1, section.label
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn check_field(&self, object: &str, field: &FieldDef, issues: &mut Vec<SchemaIssue>) {
        if field.type_.is_picklist() && field.picklist().is_empty() {
            issues.push(SchemaIssue::error(
                object,
                format!("picklist field '{}' has no picklistValues", field.api_name),
            ));
        }
        if field.type_.is_lookup() {
            match &field.lookup_object {
                None => issues.push(SchemaIssue::error(
                    object,
                    format!("lookup field '{}' has no lookupObject", field.api_name),
                )),
                Some(target)
                    if field.type_ == FieldType::Lookup && self.object(target).is_none() =>
                {
                    issues.push(SchemaIssue::warning(
                        object,
                        format!(
                            "lookup field '{}' targets unknown object '{target}'",
                            field.api_name
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        if let (Some(min), Some(max)) = (field.min, field.max) {
            if min > max {
                issues.push(SchemaIssue::error(
                    object,
                    format!("field '{}' has min greater than max", field.api_name),
                ));
            }
        }
        if let (Some(min), Some(max)) = (field.min_length, field.max_length) {
            if min > max {
                issues.push(SchemaIssue::error(
                    object,
                    format!(
                        "field '{}' has minLength greater than maxLength",
                        field.api_name
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayoutField, LayoutType, PageLayout, RecordType, Section, Tab};

    fn contact() -> ObjectDef {
        ObjectDef::new("Contact", "Contact")
            .with_field(FieldDef::new("firstName", "First Name", FieldType::Text))
            .with_field(FieldDef::new("lastName", "Last Name", FieldType::Text).required())
            .with_field(
                FieldDef::new("account", "Account", FieldType::Lookup).with_lookup("Account"),
            )
    }

    fn account() -> ObjectDef {
        ObjectDef::new("Account", "Account")
            .with_field(FieldDef::new("name", "Name", FieldType::Text).required())
    }

    #[test]
    fn object_lookup_by_api_name() {
        let schema = Schema::new(vec![contact(), account()]);
        assert_eq!(schema.len(), 2);
        assert!(schema.object("Contact").is_some());
        assert!(schema.object("contact").is_none());
        assert!(matches!(
            schema.require_object("Lead"),
            Err(SchemaError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn clean_schema_has_no_issues() {
        let schema = Schema::new(vec![contact(), account()]);
        assert!(schema.check().is_empty());
        assert!(schema.validated().is_ok());
    }

    #[test]
    fn duplicate_objects_and_fields_reported() {
        let broken = account().with_field(FieldDef::new("name", "Name", FieldType::Text));
        let schema = Schema::new(vec![broken, account()]);
        let issues = schema.check();
        assert!(issues
            .iter()
            .any(|i| i.message.contains("duplicate object apiName")));
        assert!(issues
            .iter()
            .any(|i| i.message.contains("duplicate field apiName 'name'")));
        assert!(matches!(
            schema.validated(),
            Err(SchemaError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn dangling_default_record_type_reported() {
        let mut object = account();
        object.default_record_type_id = Some("missing".into());
        let issues = Schema::new(vec![object]).check();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("defaultRecordTypeId"));
    }

    #[test]
    fn record_type_layout_must_exist() {
        let object = account().with_record_type(RecordType {
            id: "partner".into(),
            label: "Partner".into(),
            page_layout_id: "nope".into(),
        });
        let issues = Schema::new(vec![object]).check();
        assert!(issues[0].message.contains("missing layout 'nope'"));
    }

    #[test]
    fn picklist_and_lookup_requirements() {
        let object = ObjectDef::new("Deal", "Deal")
            .with_field(FieldDef::new("stage", "Stage", FieldType::Picklist))
            .with_field(FieldDef::new("owner", "Owner", FieldType::Lookup))
            .with_field(FieldDef::new("partner", "Partner", FieldType::Lookup).with_lookup("Partner"))
            .with_field(
                FieldDef::new("erp", "ERP", FieldType::ExternalLookup).with_lookup("ErpOrder"),
            );
        let issues = Schema::new(vec![object]).check();
        assert!(issues.iter().any(|i| i.message.contains("no picklistValues")));
        assert!(issues.iter().any(|i| i.message.contains("no lookupObject")));
        let unknown_target: Vec<_> = issues
            .iter()
            .filter(|i| i.message.contains("unknown object"))
            .collect();
        assert_eq!(unknown_target.len(), 1);
        assert_eq!(unknown_target[0].severity, ErrorSeverity::Warning);
    }

    #[test]
    fn grid_collisions_and_column_bounds_reported() {
        let layout = PageLayout::new("l1", "Main", LayoutType::Create).tab(
            Tab::new("Main", 0)
                .section(
                    Section::new("Info", 0, 2)
                        .field(LayoutField::new("firstName", 0))
                        .field(LayoutField::new("lastName", 2).at_column(0)),
                )
                .section(Section::new("Wide", 1, 4)),
        );
        let issues = Schema::new(vec![contact().with_layout(layout), account()]).check();
        assert!(issues.iter().any(|i| i.message.contains("4 columns")));
        // order 0 -> (0,0), order 2 -> (1,0): no collision
        assert!(!issues.iter().any(|i| i.message.contains("share row")));

        let colliding = PageLayout::new("l2", "Main", LayoutType::Edit).tab(
            Tab::new("Main", 0).section(
                Section::new("Info", 0, 2)
                    .field(LayoutField::new("firstName", 0))
                    .field(LayoutField::new("lastName", 1).at_column(0)),
            ),
        );
        let issues = Schema::new(vec![contact().with_layout(colliding), account()]).check();
        assert!(issues
            .iter()
            .any(|i| i.message.contains("share row 0 column 0")));
    }

    #[test]
    fn schema_yaml_round_trip() {
        let schema = Schema::new(vec![contact(), account()]);
        let yaml = serde_yaml::to_string(&schema).unwrap();
        assert!(yaml.starts_with("objects:"));
        let parsed: Schema = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, schema);
        assert!(parsed.object("Account").is_some());
    }

    #[test]
    fn field_lookup_impls() {
        let object = contact();
        assert!(FieldLookup::field(&object, "lastName").is_some());
        let map: HashMap<String, FieldDef> = object
            .fields
            .iter()
            .map(|f| (f.api_name.clone(), f.clone()))
            .collect();
        assert!(map.field("firstName").is_some());
        assert!(object.fields.as_slice().field("account").is_some());
    }
}
