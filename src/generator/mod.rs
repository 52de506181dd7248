//! Identifier generation for rows whose key is derived from their content.

pub mod hashed;

use std::fmt;
use std::sync::Arc;

use crate::core::{BulkError, Result, Row, Value};

pub use hashed::{HashedIdGenerator, simple_hash};

/// Generates an identifier from the accumulated field map of one row.
pub trait BulkIdGenerator: Send + Sync {
    fn generate_bulk(&self, class: &str, row: &Row) -> Result<Value>;
}

/// A custom identifier generator declared on an entity class. Only generators
/// that also expose [`BulkIdGenerator`] can be used by bulk operations.
pub trait IdGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn as_bulk(&self) -> Option<&dyn BulkIdGenerator> {
        None
    }
}

/// A generator that passed the bulk capability check during metadata resolution.
#[derive(Clone)]
pub struct BulkGenerator {
    inner: Arc<dyn IdGenerator>,
}

impl BulkGenerator {
    pub fn new(generator: Arc<dyn IdGenerator>) -> Result<Self> {
        if generator.as_bulk().is_none() {
            return Err(BulkError::UnsupportedGenerator(generator.name().to_string()));
        }
        Ok(Self { inner: generator })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn generate(&self, class: &str, row: &Row) -> Result<Value> {
        match self.inner.as_bulk() {
            Some(bulk) => bulk.generate_bulk(class, row),
            None => Err(BulkError::UnsupportedGenerator(self.inner.name().to_string())),
        }
    }
}

impl fmt::Debug for BulkGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkGenerator")
            .field("name", &self.inner.name())
            .finish()
    }
}
