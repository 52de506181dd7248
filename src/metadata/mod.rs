//! Per-class metadata consumed by the bulk operations.

pub mod mapping;
pub mod resolver;

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::{BulkError, ColumnDescriptor, Result};
use crate::generator::BulkGenerator;

pub use mapping::{
    AssociationKind, AssociationMapping, ClassMapping, FieldMapping, FieldOptions,
    GeneratorDefinition, JoinColumnMapping, MetadataProvider, StaticMetadataProvider,
};
pub use resolver::{MetadataCache, MetadataResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    #[serde(rename = "prePersist")]
    PrePersist,
    #[serde(rename = "preUpdate")]
    PreUpdate,
}

/// Table, columns, identifier and generator of one entity class. Built once
/// and shared read-only by every bulk operation on that class.
#[derive(Debug)]
pub struct EntityMetadata {
    class: String,
    table: String,
    fields: IndexMap<String, Arc<ColumnDescriptor>>,
    id_fields: Vec<String>,
    generator: Option<BulkGenerator>,
    lifecycle_callbacks: BTreeMap<LifecycleEvent, Vec<String>>,
}

impl EntityMetadata {
    pub fn builder(class: impl Into<String>, table: impl Into<String>) -> EntityMetadataBuilder {
        EntityMetadataBuilder {
            class: class.into(),
            table: table.into(),
            fields: IndexMap::new(),
            id_fields: Vec::new(),
            generator: None,
            lifecycle_callbacks: BTreeMap::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Arc<ColumnDescriptor>)> {
        self.fields.iter().map(|(name, column)| (name.as_str(), column))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Option<&Arc<ColumnDescriptor>> {
        self.fields.get(name)
    }

    /// Like [`field`](Self::field) but reports an unknown name as `FieldNotFound`.
    pub fn column(&self, name: &str) -> Result<&Arc<ColumnDescriptor>> {
        self.fields
            .get(name)
            .ok_or_else(|| BulkError::field_not_found(&self.class, name))
    }

    pub fn id_fields(&self) -> &[String] {
        &self.id_fields
    }

    /// First identifier field; composite keys use [`id_fields`](Self::id_fields).
    pub fn id_field(&self) -> &str {
        &self.id_fields[0]
    }

    pub fn is_id_field(&self, name: &str) -> bool {
        self.id_fields.iter().any(|id| id == name)
    }

    pub fn generator(&self) -> Option<&BulkGenerator> {
        self.generator.as_ref()
    }

    pub fn callbacks(&self, event: LifecycleEvent) -> &[String] {
        self.lifecycle_callbacks
            .get(&event)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_callbacks(&self) -> bool {
        self.lifecycle_callbacks.values().any(|names| !names.is_empty())
    }
}

pub struct EntityMetadataBuilder {
    class: String,
    table: String,
    fields: IndexMap<String, Arc<ColumnDescriptor>>,
    id_fields: Vec<String>,
    generator: Option<BulkGenerator>,
    lifecycle_callbacks: BTreeMap<LifecycleEvent, Vec<String>>,
}

impl EntityMetadataBuilder {
    pub fn field(mut self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
        self.fields.insert(name.into(), Arc::new(column));
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_fields.push(name.into());
        self
    }

    pub fn generator(mut self, generator: BulkGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn callbacks(mut self, event: LifecycleEvent, names: Vec<String>) -> Self {
        self.lifecycle_callbacks.entry(event).or_default().extend(names);
        self
    }

    /// Every identifier must be a known field, and there must be at least one.
    pub fn build(self) -> Result<EntityMetadata> {
        if self.id_fields.is_empty() {
            return Err(BulkError::InvalidMapping(format!(
                "class '{}' declares no identifier",
                self.class
            )));
        }
        if let Some(missing) = self.id_fields.iter().find(|id| !self.fields.contains_key(*id)) {
            return Err(BulkError::InvalidMapping(format!(
                "identifier '{}' of class '{}' is not a mapped field",
                missing, self.class
            )));
        }

        Ok(EntityMetadata {
            class: self.class,
            table: self.table,
            fields: self.fields,
            id_fields: self.id_fields,
            generator: self.generator,
            lifecycle_callbacks: self.lifecycle_callbacks,
        })
    }
}
