//! Boundary to the database connection that runs generated statements.

pub mod recording;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::core::{BulkError, ColumnDescriptor, Result, Value};
use crate::entity::Entity;
use crate::platform::Platform;

pub use recording::RecordingExecutor;

/// A value to bind, with the column it is written to so the executor can
/// pick the driver type.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Value,
    pub column: Arc<ColumnDescriptor>,
}

impl Param {
    pub fn new(value: Value, column: Arc<ColumnDescriptor>) -> Self {
        Self { value, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// `?` placeholders, bound in order.
    Positional(Vec<Param>),
    /// `:name` placeholders.
    Named(IndexMap<String, Param>),
}

impl Params {
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(params) => params.len(),
            Self::Named(params) => params.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> Vec<&Value> {
        match self {
            Self::Positional(params) => params.iter().map(|p| &p.value).collect(),
            Self::Named(params) => params.values().map(|p| &p.value).collect(),
        }
    }

    pub fn named(&self, name: &str) -> Option<&Param> {
        match self {
            Self::Named(params) => params.get(name),
            Self::Positional(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Synchronous database handle. Failures are returned unchanged to the caller
/// of the bulk operation; nothing is retried.
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Dialect used for quoting, literals and feature checks.
    fn platform(&self) -> Platform;

    /// Runs one statement and returns the number of affected rows.
    fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Identifier generated by the most recent insert, if the platform has one.
    fn last_insert_id(&self) -> Result<Option<String>>;

    /// Streams text-format rows to a `COPY ... FROM STDIN` command.
    fn copy_in(&self, command: &str, lines: &[String]) -> Result<u64> {
        let _ = (command, lines);
        Err(BulkError::unsupported_platform(self.platform(), "COPY"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    New,
    Managed,
    Detached,
    Removed,
}

/// Tells whether an entity is already tracked by the ORM. Only used to pick
/// which lifecycle callbacks run.
pub trait UnitOfWork: Send + Sync {
    fn entity_state(&self, entity: &dyn Entity) -> Result<EntityState>;
}
