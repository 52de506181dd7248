//! Entity capability: how the bulk engine reads fields out of live objects.
//!
//! Entities expose their persisted fields through [`Entity::field`], usually
//! generated by `#[derive(BulkEntity)]`. A field that was never assigned is
//! reported as [`FieldValue::NotInitialized`], which is distinct from a field
//! explicitly set to `NULL`.

pub mod extractor;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::core::{BulkError, Result, Value};

pub use extractor::{FieldExtractor, FieldPath};

/// Outcome of reading one field from an object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Initialized(Value),
    NotInitialized,
}

impl FieldValue {
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Initialized(value) => Some(value),
            Self::NotInitialized => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Initialized(value) => Some(value),
            Self::NotInitialized => None,
        }
    }
}

/// An object whose fields can be persisted in bulk.
pub trait Entity: fmt::Debug + Send + Sync {
    /// Runtime class name, matched against the class a bulk operation is bound to.
    fn class_name(&self) -> &'static str;

    /// Reads a single (non-dotted) field. `None` means the class does not
    /// declare the field at all.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Runs a lifecycle callback registered in the class metadata.
    fn invoke_callback(&mut self, name: &str) -> Result<()> {
        Err(BulkError::CallbackNotFound {
            class: self.class_name().to_string(),
            callback: name.to_string(),
        })
    }
}

/// Static class name, used to resolve metadata before any instance exists.
pub trait EntityClass: Entity {
    const CLASS: &'static str;
}

/// Shared handle to a related or embedded object stored inside a [`Value`].
#[derive(Clone)]
pub struct EntityRef(Arc<dyn Entity>);

impl EntityRef {
    pub fn new<E: Entity + 'static>(entity: E) -> Self {
        Self(Arc::new(entity))
    }

    pub fn from_arc(entity: Arc<dyn Entity>) -> Self {
        Self(entity)
    }

    pub fn get(&self) -> &dyn Entity {
        self.0.as_ref()
    }

    pub fn class_name(&self) -> &'static str {
        self.0.class_name()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.class_name())
    }
}

/// A field that may never have been assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Unset,
    Set(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Slot<T> {
    pub fn set(&mut self, value: T) {
        *self = Self::Set(value);
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unset => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

impl<T> From<T> for Slot<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}

/// Conversion from a struct field to the value the engine sees.
pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

macro_rules! scalar_field_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToFieldValue for $ty {
                fn to_field_value(&self) -> FieldValue {
                    FieldValue::Initialized(Value::from(self.clone()))
                }
            }
        )*
    };
}

scalar_field_value!(i64, i32, u32, f64, bool, String, DateTime<Utc>, NaiveDate, Uuid);

impl ToFieldValue for Value {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Initialized(self.clone())
    }
}

impl<T: ToFieldValue> ToFieldValue for Option<T> {
    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(value) => value.to_field_value(),
            None => FieldValue::Initialized(Value::Null),
        }
    }
}

impl<T: ToFieldValue> ToFieldValue for Slot<T> {
    fn to_field_value(&self) -> FieldValue {
        match self {
            Slot::Set(value) => value.to_field_value(),
            Slot::Unset => FieldValue::NotInitialized,
        }
    }
}

impl<E: Entity + 'static> ToFieldValue for Arc<E> {
    fn to_field_value(&self) -> FieldValue {
        let entity: Arc<dyn Entity> = self.clone();
        FieldValue::Initialized(Value::Entity(EntityRef::from_arc(entity)))
    }
}
