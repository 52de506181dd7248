use indexmap::IndexMap;

use super::{BulkError, Result, Value};

/// One pending row: field name to value, in the order fields were supplied.
pub type Row = IndexMap<String, Value>;

/// Immutable description of one persisted field.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    name: String,
    logical_type: String,
    nullable: bool,
    has_default: bool,
    default: Value,
    referenced: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, logical_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logical_type: logical_type.into(),
            nullable: false,
            has_default: false,
            default: Value::Null,
            referenced: None,
        }
    }

    /// Join column pointing at `referenced` on the related entity. Joins never
    /// carry a default.
    pub fn join(name: impl Into<String>, referenced: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type: String::new(),
            nullable,
            has_default: false,
            default: Value::Null,
            referenced: Some(referenced.into()),
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.has_default = true;
        self.default = default;
        self
    }

    /// Storage column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_type(&self) -> &str {
        &self.logical_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    /// Only meaningful when [`has_default`](Self::has_default) is true.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn referenced(&self) -> Option<&str> {
        self.referenced.as_deref()
    }

    pub fn is_join(&self) -> bool {
        self.referenced.is_some()
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.logical_type.as_str(), "boolean" | "bool")
    }

    pub fn check_null(&self, class: &str, field: &str, value: &Value) -> Result<()> {
        if value.is_null() && !self.nullable {
            return Err(BulkError::null_value(class, field));
        }
        Ok(())
    }
}
