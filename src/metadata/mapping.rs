//! Raw class metadata as supplied by the ORM layer.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use super::LifecycleEvent;
use crate::core::{BulkError, Result};
use crate::generator::IdGenerator;

/// Source of raw class metadata, keyed by class name.
pub trait MetadataProvider: Send + Sync {
    fn class_mapping(&self, class: &str) -> Result<ClassMapping>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMapping {
    pub class: String,
    pub table: String,
    pub identifier: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub associations: Vec<AssociationMapping>,
    #[serde(default)]
    pub lifecycle_callbacks: BTreeMap<LifecycleEvent, Vec<String>>,
    #[serde(skip)]
    pub generator: Option<GeneratorDefinition>,
}

impl ClassMapping {
    pub fn new(class: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            table: table.into(),
            identifier: Vec::new(),
            fields: Vec::new(),
            associations: Vec::new(),
            lifecycle_callbacks: BTreeMap::new(),
            generator: None,
        }
    }

    pub fn identifier<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifier = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    pub fn association(mut self, association: AssociationMapping) -> Self {
        self.associations.push(association);
        self
    }

    pub fn callback(mut self, event: LifecycleEvent, name: impl Into<String>) -> Self {
        self.lifecycle_callbacks
            .entry(event)
            .or_default()
            .push(name.into());
        self
    }

    pub fn generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.generator = Some(GeneratorDefinition(generator));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: String,
    /// Storage column, defaults to the field name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub logical_type: String,
    /// Absent means the ORM default (not nullable).
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub options: FieldOptions,
}

impl FieldMapping {
    pub fn new(field: impl Into<String>, logical_type: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            column: None,
            logical_type: logical_type.into(),
            nullable: None,
            options: FieldOptions::default(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.options.default = Some(value);
        self
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.field)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldOptions {
    /// `Some(Null)` is an explicit `NULL` default, `None` means no default.
    #[serde(default, deserialize_with = "present")]
    pub default: Option<serde_json::Value>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    /// Kinds that own a join column on this entity's table.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationMapping {
    pub field: String,
    pub kind: AssociationKind,
    #[serde(default)]
    pub join_columns: Vec<JoinColumnMapping>,
}

impl AssociationMapping {
    pub fn new(field: impl Into<String>, kind: AssociationKind) -> Self {
        Self {
            field: field.into(),
            kind,
            join_columns: Vec::new(),
        }
    }

    pub fn join_column(mut self, join_column: JoinColumnMapping) -> Self {
        self.join_columns.push(join_column);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinColumnMapping {
    pub name: String,
    pub referenced_column: String,
    /// Absent means nullable, as join columns are by default.
    #[serde(default)]
    pub nullable: Option<bool>,
}

impl JoinColumnMapping {
    pub fn new(name: impl Into<String>, referenced_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            referenced_column: referenced_column.into(),
            nullable: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }
}

/// Custom generator attached to a class by the host application.
#[derive(Clone)]
pub struct GeneratorDefinition(pub Arc<dyn IdGenerator>);

impl fmt::Debug for GeneratorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GeneratorDefinition").field(&self.0.name()).finish()
    }
}

/// In-memory provider, filled from code or from a JSON document.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataProvider {
    mappings: HashMap<String, ClassMapping>,
}

impl StaticMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, mapping: ClassMapping) -> Self {
        self.register(mapping);
        self
    }

    pub fn register(&mut self, mapping: ClassMapping) {
        self.mappings.insert(mapping.class.clone(), mapping);
    }

    /// Attaches a generator to an already registered class.
    pub fn set_generator(&mut self, class: &str, generator: Arc<dyn IdGenerator>) -> Result<()> {
        let mapping = self
            .mappings
            .get_mut(class)
            .ok_or_else(|| BulkError::ClassNotFound(class.to_string()))?;
        mapping.generator = Some(GeneratorDefinition(generator));
        Ok(())
    }

    /// Parses a JSON array of class mappings.
    pub fn from_json(json: &str) -> Result<Self> {
        let mappings: Vec<ClassMapping> = serde_json::from_str(json)?;
        let mut provider = Self::new();
        for mapping in mappings {
            provider.register(mapping);
        }
        Ok(provider)
    }
}

impl MetadataProvider for StaticMetadataProvider {
    fn class_mapping(&self, class: &str) -> Result<ClassMapping> {
        self.mappings
            .get(class)
            .cloned()
            .ok_or_else(|| BulkError::ClassNotFound(class.to_string()))
    }
}
