use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::{Entity, FieldValue};
use crate::core::{BulkError, ColumnDescriptor, Result, Value};

/// A field path split into its segments once, e.g. `address.city`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

/// Reads field values out of entities of one class.
///
/// Parsed paths are cached per field path, and join dereference paths per
/// `field.referenced` key, so repeated rows only pay for the accessor calls.
#[derive(Debug)]
pub struct FieldExtractor {
    class: String,
    paths: HashMap<String, Arc<FieldPath>>,
    joins: HashMap<String, Arc<FieldPath>>,
}

impl FieldExtractor {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            paths: HashMap::new(),
            joins: HashMap::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Resolves a possibly dotted field path, stopping at the first segment
    /// that was never initialized.
    pub fn resolve(&mut self, entity: &dyn Entity, field_path: &str) -> Result<FieldValue> {
        let path = self
            .paths
            .entry(field_path.to_string())
            .or_insert_with(|| Arc::new(FieldPath::parse(field_path)))
            .clone();

        walk(&self.class, entity, &path, field_path)
    }

    /// Substitutes an associated object by the value of its referenced field.
    /// Anything that is not an initialized object on a join column passes
    /// through unchanged.
    pub fn resolve_joined(
        &mut self,
        column: &ColumnDescriptor,
        value: FieldValue,
        field_path: &str,
    ) -> Result<FieldValue> {
        let Some(referenced) = column.referenced() else {
            return Ok(value);
        };
        let related = match &value {
            FieldValue::Initialized(Value::Entity(related)) => related.clone(),
            _ => return Ok(value),
        };

        let key = format!("{}.{}", field_path, referenced);
        let path = match self.joins.get(&key) {
            Some(path) => path.clone(),
            None => {
                trace!(class = %self.class, join = %key, "caching join accessor");
                let path = Arc::new(FieldPath::parse(referenced));
                self.joins.insert(key.clone(), path.clone());
                path
            }
        };

        walk(&self.class, related.get(), &path, &key)
    }

    /// Resolve followed by join dereferencing, the way queued entities are read.
    pub fn extract(
        &mut self,
        entity: &dyn Entity,
        field_path: &str,
        column: &ColumnDescriptor,
    ) -> Result<FieldValue> {
        let value = self.resolve(entity, field_path)?;
        self.resolve_joined(column, value, field_path)
    }
}

fn walk(class: &str, root: &dyn Entity, path: &FieldPath, display: &str) -> Result<FieldValue> {
    let mut segments = path.segments().iter();
    let Some(first) = segments.next() else {
        return Err(BulkError::field_not_found(class, display));
    };

    let mut current = read(root, first)?;
    for segment in segments {
        let FieldValue::Initialized(value) = current else {
            return Ok(FieldValue::NotInitialized);
        };

        current = match value {
            Value::Entity(object) => read(object.get(), segment)?,
            Value::Null => return Ok(FieldValue::Initialized(Value::Null)),
            _ => return Err(BulkError::field_not_found(class, display)),
        };
    }

    Ok(current)
}

fn read(entity: &dyn Entity, name: &str) -> Result<FieldValue> {
    entity
        .field(name)
        .ok_or_else(|| BulkError::field_not_found(entity.class_name(), name))
}
