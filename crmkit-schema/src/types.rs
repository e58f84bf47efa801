//! Core metadata types: objects, fields, layouts and record types.
//!
//! All types serialize to/from YAML or JSON via serde using camelCase keys.
//! An `ObjectDef` owns its fields, layouts, record types and validation
//! rules; layouts reference fields by `apiName` only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::ConditionNode;
use crate::error::{Result, SchemaError};
use crate::record::Record;

/// The kind of a field. Determines storage shape, validators and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    LongText,
    EncryptedText,
    Email,
    Phone,
    Url,
    Number,
    Currency,
    Percent,
    Date,
    DateTime,
    Time,
    Checkbox,
    Picklist,
    MultiPicklist,
    Address,
    Geolocation,
    Lookup,
    ExternalLookup,
    AutoNumber,
    Formula,
    RollupSummary,
}

impl FieldType {
    pub const ALL: [FieldType; 22] = [
        FieldType::Text,
        FieldType::LongText,
        FieldType::EncryptedText,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Url,
        FieldType::Number,
        FieldType::Currency,
        FieldType::Percent,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Time,
        FieldType::Checkbox,
        FieldType::Picklist,
        FieldType::MultiPicklist,
        FieldType::Address,
        FieldType::Geolocation,
        FieldType::Lookup,
        FieldType::ExternalLookup,
        FieldType::AutoNumber,
        FieldType::Formula,
        FieldType::RollupSummary,
    ];

    /// Values for these kinds are produced by the system, never typed in.
    pub fn is_auto_generated(self) -> bool {
        matches!(
            self,
            FieldType::AutoNumber | FieldType::Formula | FieldType::RollupSummary
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::Currency | FieldType::Percent
        )
    }

    pub fn is_picklist(self) -> bool {
        matches!(self, FieldType::Picklist | FieldType::MultiPicklist)
    }

    pub fn is_lookup(self) -> bool {
        matches!(self, FieldType::Lookup | FieldType::ExternalLookup)
    }
}

/// A field definition: the schema for a single named attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub api_name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picklist_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Target object apiName for Lookup/ExternalLookup fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<ConditionNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Overrides the catalog default used when a record is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// AutoNumber display pattern such as `INV-{0000}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_format: Option<String>,
}

impl FieldDef {
    /// A non-required, editable field with no constraints.
    pub fn new(api_name: impl Into<String>, label: impl Into<String>, type_: FieldType) -> Self {
        Self {
            api_name: api_name.into(),
            label: label.into(),
            type_,
            required: false,
            read_only: false,
            picklist_values: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            lookup_object: None,
            visible_if: None,
            help_text: None,
            default_value: None,
            display_format: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_picklist<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.picklist_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_lookup(mut self, object: impl Into<String>) -> Self {
        self.lookup_object = Some(object.into());
        self
    }

    pub fn with_visible_if(mut self, condition: ConditionNode) -> Self {
        self.visible_if = Some(condition);
        self
    }

    /// Read-only either by flag or because the kind is system-generated.
    pub fn is_effectively_read_only(&self) -> bool {
        self.read_only || self.type_.is_auto_generated()
    }

    pub fn picklist(&self) -> &[String] {
        self.picklist_values.as_deref().unwrap_or(&[])
    }
}

/// The context a page layout is used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutType {
    Create,
    Edit,
}

/// A field placed in a section.
///
/// `row = order / columns`. When `column` is absent it is derived as
/// `order % columns`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutField {
    pub api_name: String,
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl LayoutField {
    pub fn new(api_name: impl Into<String>, order: usize) -> Self {
        Self {
            api_name: api_name.into(),
            order,
            column: None,
        }
    }

    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub label: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default)]
    pub fields: Vec<LayoutField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<ConditionNode>,
}

fn default_columns() -> usize {
    1
}

impl Section {
    pub fn new(label: impl Into<String>, order: usize, columns: usize) -> Self {
        Self {
            label: label.into(),
            order,
            columns,
            fields: Vec::new(),
            visible_if: None,
        }
    }

    pub fn field(mut self, field: LayoutField) -> Self {
        self.fields.push(field);
        self
    }

    /// Columns clamped into the supported 1..=3 range.
    pub fn effective_columns(&self) -> usize {
        self.columns.clamp(1, 3)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub label: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Tab {
    pub fn new(label: impl Into<String>, order: usize) -> Self {
        Self {
            label: label.into(),
            order,
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}

/// An ordered, fixed view of a subset of an object's fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub id: String,
    pub name: String,
    pub layout_type: LayoutType,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

impl PageLayout {
    pub fn new(id: impl Into<String>, name: impl Into<String>, layout_type: LayoutType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layout_type,
            is_default: false,
            tabs: Vec::new(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn tab(mut self, tab: Tab) -> Self {
        self.tabs.push(tab);
        self
    }

    /// Every layout field with the section it sits in, in declaration order.
    pub fn layout_fields(&self) -> impl Iterator<Item = (&Section, &LayoutField)> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.sections.iter())
            .flat_map(|section| section.fields.iter().map(move |f| (section, f)))
    }

    pub fn references_field(&self, api_name: &str) -> bool {
        self.layout_fields().any(|(_, f)| f.api_name == api_name)
    }
}

/// A sub-classification of an object's records bound to one layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordType {
    pub id: String,
    pub label: String,
    pub page_layout_id: String,
}

/// An object-level rule: when `condition` holds, the record is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub name: String,
    pub condition: ConditionNode,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_field: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A user-defined entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDef {
    pub api_name: String,
    pub label: String,
    pub plural_label: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub page_layouts: Vec<PageLayout>,
    #[serde(default)]
    pub record_types: Vec<RecordType>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_record_type_id: Option<String>,
}

impl ObjectDef {
    pub fn new(api_name: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            api_name: api_name.into(),
            plural_label: format!("{label}s"),
            label,
            fields: Vec::new(),
            page_layouts: Vec::new(),
            record_types: Vec::new(),
            validation_rules: Vec::new(),
            default_record_type_id: None,
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_layout(mut self, layout: PageLayout) -> Self {
        self.page_layouts.push(layout);
        self
    }

    pub fn with_record_type(mut self, record_type: RecordType) -> Self {
        self.record_types.push(record_type);
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    pub fn field(&self, api_name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.api_name == api_name)
    }

    pub fn layout(&self, id: &str) -> Option<&PageLayout> {
        self.page_layouts.iter().find(|l| l.id == id)
    }

    pub fn record_type(&self, id: &str) -> Option<&RecordType> {
        self.record_types.iter().find(|rt| rt.id == id)
    }

    /// The default layout for a context, else the first layout of that type.
    pub fn default_layout(&self, layout_type: LayoutType) -> Option<&PageLayout> {
        let mut of_type = self
            .page_layouts
            .iter()
            .filter(|l| l.layout_type == layout_type);
        let first = of_type.clone().next();
        of_type.find(|l| l.is_default).or(first)
    }

    /// Resolve which layout applies to a record in a given context.
    ///
    /// Record override, then the record's type, then the object's default
    /// record type, then the default layout for the context. A referenced
    /// layout of the wrong context is skipped.
    pub fn layout_for(&self, record: &Record, layout_type: LayoutType) -> Option<&PageLayout> {
        let matching = |id: &str| self.layout(id).filter(|l| l.layout_type == layout_type);

        if let Some(layout) = record.page_layout_id.as_deref().and_then(matching) {
            return Some(layout);
        }
        let record_type = record
            .record_type_id
            .as_deref()
            .or(self.default_record_type_id.as_deref())
            .and_then(|id| self.record_type(id));
        if let Some(layout) = record_type.and_then(|rt| matching(&rt.page_layout_id)) {
            return Some(layout);
        }
        self.default_layout(layout_type)
    }

    /// Add a field, rejecting a duplicate apiName.
    pub fn add_field(&mut self, field: FieldDef) -> Result<()> {
        if self.field(&field.api_name).is_some() {
            return Err(SchemaError::DuplicateField {
                object: self.api_name.clone(),
                field: field.api_name,
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Remove a field unless a layout or a stored record still references it.
    pub fn remove_field<'a, I>(&mut self, api_name: &str, stored: I) -> Result<FieldDef>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let idx = self
            .fields
            .iter()
            .position(|f| f.api_name == api_name)
            .ok_or_else(|| SchemaError::FieldNotFound {
                object: self.api_name.clone(),
                field: api_name.to_string(),
            })?;

        let in_use = |reason: String| SchemaError::FieldInUse {
            object: self.api_name.clone(),
            field: api_name.to_string(),
            reason,
        };

        if let Some(layout) = self.page_layouts.iter().find(|l| l.references_field(api_name)) {
            return Err(in_use(format!("placed on layout '{}'", layout.id)));
        }
        if let Some(record) = stored.into_iter().find(|r| r.has_value(api_name)) {
            return Err(in_use(format!("record '{}' holds a value", record.id)));
        }

        Ok(self.fields.remove(idx))
    }
}
