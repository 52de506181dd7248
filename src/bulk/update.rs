use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::queue::{normalize_raw, reject_object};
use crate::config::BulkConfig;
use crate::core::{BulkError, ColumnDescriptor, Result, Row, Value};
use crate::entity::{Entity, EntityClass, FieldExtractor, FieldValue};
use crate::executor::{Executor, Param, Params, Statement};
use crate::metadata::{EntityMetadata, MetadataCache, MetadataProvider};
use crate::platform::Platform;

/// Updates many rows of one table with a single statement of the form
/// `UPDATE t SET c = CASE WHEN key = k THEN v ... END, ... WHERE key IN (...)`.
///
/// Rows are keyed by the value of the key field (the identifier unless
/// changed with [`set_key_field`](Self::set_key_field)). Queuing the same key
/// again replaces the earlier row in place.
pub struct BulkUpdate {
    metadata: Arc<EntityMetadata>,
    executor: Arc<dyn Executor>,
    extractor: FieldExtractor,
    config: BulkConfig,
    key_field: String,
    rows: IndexMap<Value, Row>,
}

impl BulkUpdate {
    pub fn new(metadata: Arc<EntityMetadata>, executor: Arc<dyn Executor>) -> Self {
        Self {
            extractor: FieldExtractor::new(metadata.class()),
            key_field: metadata.id_field().to_string(),
            metadata,
            executor,
            config: BulkConfig::default(),
            rows: IndexMap::new(),
        }
    }

    pub fn for_class<E: EntityClass>(
        provider: &dyn MetadataProvider,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let metadata = MetadataCache::global().resolve_class::<E>(provider)?;
        Ok(Self::new(metadata, executor))
    }

    pub fn with_config(mut self, config: BulkConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn platform(&self) -> Platform {
        self.config
            .platform
            .unwrap_or_else(|| self.executor.platform())
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, key: &Value) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Changes the field rows are matched on. Only allowed while the queue is empty.
    pub fn set_key_field(&mut self, field: &str) -> Result<()> {
        if !self.rows.is_empty() && field != self.key_field {
            return Err(BulkError::CannotChangeKeyField {
                class: self.metadata.class().to_string(),
                current: self.key_field.clone(),
                requested: field.to_string(),
            });
        }
        self.metadata.column(field)?;
        self.key_field = field.to_string();
        Ok(())
    }

    /// Queues new values for the row whose key field equals `key`.
    pub fn add_value<I, K, V>(&mut self, key: impl Into<Value>, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let class = self.metadata.class();
        let key = key.into();
        if key.is_null() {
            return Err(BulkError::null_value(class, &self.key_field));
        }

        let mut row = Row::new();
        for (name, value) in values {
            let name: String = name.into();
            let column = self.metadata.column(&name)?;
            let value = normalize_raw(&mut self.extractor, class, &name, column, value.into())?;
            row.insert(name, value);
        }

        self.queue(key, row);
        Ok(())
    }

    /// Queues the initialized fields of `entity`, or only `fields` when given.
    /// Fields that were never assigned are left untouched by the update.
    pub fn add_entity(&mut self, entity: &dyn Entity, fields: Option<&[&str]>) -> Result<()> {
        let metadata = self.metadata.clone();
        let class = metadata.class();
        if entity.class_name() != class {
            return Err(BulkError::WrongEntity {
                expected: class.to_string(),
                actual: entity.class_name().to_string(),
            });
        }
        if let Some(fields) = fields {
            for field in fields {
                metadata.column(field)?;
            }
        }

        let mut row = Row::new();
        for (name, column) in metadata.fields() {
            if name == self.key_field {
                continue;
            }
            if let Some(fields) = fields {
                if !fields.contains(&name) {
                    continue;
                }
            }

            let FieldValue::Initialized(value) = self.extractor.extract(entity, name, column)? else {
                continue;
            };
            column.check_null(class, name, &value)?;
            reject_object(class, name, &value)?;
            row.insert(name.to_string(), value);
        }

        let key_column = metadata.column(&self.key_field)?;
        let key = match self.extractor.extract(entity, &self.key_field, key_column)? {
            FieldValue::Initialized(value) if !value.is_null() => value,
            _ => match metadata.generator() {
                Some(generator) => generator.generate(class, &row)?,
                None => return Err(BulkError::null_value(class, &self.key_field)),
            },
        };
        reject_object(class, &self.key_field, &key)?;

        self.queue(key, row);
        Ok(())
    }

    /// Rows without any column to set are not queued.
    fn queue(&mut self, key: Value, row: Row) {
        if row.is_empty() {
            trace!(class = %self.metadata.class(), key = %key, "skipping update without fields");
            return;
        }
        self.rows.insert(key, row);
    }

    /// Builds the statement for all queued rows, `None` when nothing is queued.
    pub fn get_sql(&self) -> Result<Option<Statement>> {
        if self.rows.is_empty() {
            return Ok(None);
        }

        let platform = self.platform();
        let key_column = self.metadata.column(&self.key_field)?;
        let key_sql = platform.quote_identifier(key_column.name());

        let mut fields: Vec<&str> = Vec::new();
        for row in self.rows.values() {
            for name in row.keys() {
                if !fields.contains(&name.as_str()) {
                    fields.push(name);
                }
            }
        }
        if fields.is_empty() {
            return Ok(None);
        }

        let mut params = IndexMap::new();
        let mut sets = Vec::with_capacity(fields.len());
        for (field_index, field) in fields.iter().enumerate() {
            let column = self.metadata.column(field)?;
            let column_sql = platform.quote_identifier(column.name());

            let mut case = format!("{} = CASE", column_sql);
            for (row_index, (key, row)) in self.rows.iter().enumerate() {
                let n = row_index * fields.len() + field_index;
                let when = render(platform, key, key_column, format!("W{n}"), &mut params);
                let then = match row.get(*field) {
                    Some(value) => render(platform, value, column, format!("T{n}"), &mut params),
                    None => column_sql.clone(),
                };
                case.push_str(&format!(" WHEN {} = {} THEN {}", key_sql, when, then));
            }
            case.push_str(" END");
            sets.push(case);
        }

        let criteria: Vec<String> = self
            .rows
            .keys()
            .enumerate()
            .map(|(row_index, key)| render(platform, key, key_column, format!("C{row_index}"), &mut params))
            .collect();

        let sql = format!(
            "UPDATE {} SET {} WHERE {} IN ({})",
            platform.quote_identifier(self.metadata.table()),
            sets.join(", "),
            key_sql,
            criteria.join(", ")
        );

        debug!(
            table = %self.metadata.table(),
            rows = self.rows.len(),
            columns = fields.len(),
            params = params.len(),
            "built update statement"
        );
        Ok(Some(Statement::new(sql, Params::Named(params))))
    }

    /// Runs the statement and returns the affected row count. The queue is
    /// kept when the executor fails.
    pub fn execute(&mut self) -> Result<u64> {
        let Some(statement) = self.get_sql()? else {
            return Ok(0);
        };
        let affected = self.executor.execute(&statement)?;
        self.rows.clear();
        Ok(affected)
    }
}

/// Inlines numbers, booleans and NULL; anything else becomes `:name`.
fn render(
    platform: Platform,
    value: &Value,
    column: &Arc<ColumnDescriptor>,
    name: String,
    params: &mut IndexMap<String, Param>,
) -> String {
    if let Some(literal) = platform.inline_literal(value, Some(column)) {
        return literal;
    }
    let placeholder = format!(":{}", name);
    params.insert(name, Param::new(value.clone(), column.clone()));
    placeholder
}
