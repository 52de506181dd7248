use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info_span};

use super::statement::{InsertMode, build_copy, build_insert};
use super::{BulkFlags, ValueQueue};
use crate::config::BulkConfig;
use crate::core::{BulkError, Result, Row, Value};
use crate::entity::{Entity, EntityClass};
use crate::executor::{Executor, UnitOfWork};
use crate::metadata::{EntityMetadata, MetadataCache, MetadataProvider};
use crate::platform::Platform;

/// Queues rows of one entity class and writes them with multi-row INSERTs.
pub struct BulkInsert {
    queue: ValueQueue,
    executor: Arc<dyn Executor>,
    config: BulkConfig,
    mode: InsertMode,
}

impl BulkInsert {
    pub fn new(metadata: Arc<EntityMetadata>, executor: Arc<dyn Executor>) -> Self {
        Self::with_mode(metadata, executor, InsertMode::Insert)
    }

    /// Resolves the metadata of `E` through the process-wide cache.
    pub fn for_class<E: EntityClass>(
        provider: &dyn MetadataProvider,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let metadata = MetadataCache::global().resolve_class::<E>(provider)?;
        Ok(Self::new(metadata, executor))
    }

    fn with_mode(metadata: Arc<EntityMetadata>, executor: Arc<dyn Executor>, mode: InsertMode) -> Self {
        Self {
            queue: ValueQueue::new(metadata),
            executor,
            config: BulkConfig::default(),
            mode,
        }
    }

    pub fn with_config(mut self, config: BulkConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_unit_of_work(mut self, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        self.queue.set_unit_of_work(unit_of_work);
        self
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        self.queue.metadata()
    }

    pub fn platform(&self) -> Platform {
        self.config
            .platform
            .unwrap_or_else(|| self.executor.platform())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        self.queue.rows()
    }

    pub fn add_value<I, K, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let row = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.queue.add_value(row)
    }

    pub fn add_entity(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.queue.add_entity(entity)
    }

    pub fn add_entity_fields(&mut self, entity: &mut dyn Entity, fields: &[&str]) -> Result<()> {
        self.queue.add_entity_fields(entity, fields)
    }

    /// Writes the queue with the configured flags and chunk size.
    pub fn execute(&mut self) -> Result<Option<String>> {
        let (flags, max_rows) = (self.config.flags, self.config.max_rows);
        self.execute_with(flags, max_rows)
    }

    /// Writes the queue in chunks of `max_rows` and returns the first chunk's
    /// insert id when one is meaningful.
    ///
    /// On success the queue is cleared. When a chunk fails, the rows of the
    /// chunks already written are removed from the queue and the rest stay
    /// queued, so calling `execute` again only sends what was not written.
    pub fn execute_with(&mut self, flags: BulkFlags, max_rows: usize) -> Result<Option<String>> {
        if self.queue.is_empty() {
            return Ok(None);
        }
        if max_rows == 0 {
            return Err(BulkError::InvalidConfig("max_rows must be > 0".to_string()));
        }

        let platform = self.platform();
        if flags.contains(BulkFlags::COPY_AS_INSERT) && self.mode == InsertMode::Upsert {
            return Err(BulkError::unsupported_platform(platform, "COPY with upsert"));
        }

        let metadata = self.queue.metadata().clone();
        let _span = info_span!("bulk_execute", table = %metadata.table(), mode = ?self.mode).entered();

        let selected: Vec<usize> = if flags.contains(BulkFlags::IGNORE_DUPLICATES) {
            let unique = unique_rows(self.queue.rows());
            debug!(dropped = self.queue.len() - unique.len(), "removed duplicate rows");
            unique
        } else {
            (0..self.queue.len()).collect()
        };

        let mut written = 0;
        match self.write_chunks(&metadata, platform, &selected, flags, max_rows, &mut written) {
            Ok(last_id) => {
                self.queue.clear();
                Ok(last_id)
            }
            Err(err) => {
                if written > 0 {
                    debug!(written, "dropping rows of chunks already written");
                    self.queue.discard(written);
                }
                Err(err)
            }
        }
    }

    /// Sends `selected` queue rows chunk by chunk. After each successful chunk
    /// `written` is the number of leading queue rows that need no resend.
    fn write_chunks(
        &self,
        metadata: &EntityMetadata,
        platform: Platform,
        selected: &[usize],
        flags: BulkFlags,
        max_rows: usize,
        written: &mut usize,
    ) -> Result<Option<String>> {
        let queued = self.queue.rows();
        let copy = flags.contains(BulkFlags::COPY_AS_INSERT);
        let return_id =
            !copy && !flags.contains(BulkFlags::NO_RETURN_ID) && metadata.generator().is_none();
        let ignore = flags.contains(BulkFlags::IGNORE_MODE);

        let mut last_id = None;
        for (index, chunk) in selected.chunks(max_rows).enumerate() {
            let rows: Vec<&Row> = chunk.iter().map(|&i| &queued[i]).collect();
            if copy {
                let (command, lines) = build_copy(metadata, platform, &rows)?;
                let copied = self.executor.copy_in(&command, &lines)?;
                debug!(chunk = index, copied, "copy chunk done");
            } else {
                let statement = build_insert(metadata, platform, &rows, self.mode, ignore)?;
                let affected = self.executor.execute(&statement)?;
                debug!(chunk = index, rows = rows.len(), affected, "chunk executed");
            }

            // skipped duplicates before the next unwritten row repeat rows already sent
            *written = selected
                .get((index + 1) * max_rows)
                .copied()
                .unwrap_or(queued.len());

            if index == 0 && return_id {
                last_id = self.executor.last_insert_id()?;
            }
        }
        Ok(last_id)
    }
}

/// Indexes of the first row of each group of rows with identical fields and values.
fn unique_rows(rows: &[Row]) -> Vec<usize> {
    let mut seen: HashSet<Vec<(&str, &Value)>> = HashSet::with_capacity(rows.len());
    rows.iter()
        .enumerate()
        .filter(|(_, row)| seen.insert(row.iter().map(|(k, v)| (k.as_str(), v)).collect()))
        .map(|(index, _)| index)
        .collect()
}

/// INSERT that updates the existing row on a key conflict.
pub struct BulkUpsert {
    inner: BulkInsert,
}

impl BulkUpsert {
    pub fn new(metadata: Arc<EntityMetadata>, executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: BulkInsert::with_mode(metadata, executor, InsertMode::Upsert),
        }
    }

    pub fn for_class<E: EntityClass>(
        provider: &dyn MetadataProvider,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let metadata = MetadataCache::global().resolve_class::<E>(provider)?;
        Ok(Self::new(metadata, executor))
    }

    pub fn with_config(self, config: BulkConfig) -> Result<Self> {
        Ok(Self {
            inner: self.inner.with_config(config)?,
        })
    }

    pub fn with_unit_of_work(self, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            inner: self.inner.with_unit_of_work(unit_of_work),
        }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        self.inner.metadata()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        self.inner.rows()
    }

    pub fn add_value<I, K, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.inner.add_value(values)
    }

    pub fn add_entity(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.inner.add_entity(entity)
    }

    pub fn add_entity_fields(&mut self, entity: &mut dyn Entity, fields: &[&str]) -> Result<()> {
        self.inner.add_entity_fields(entity, fields)
    }

    pub fn execute(&mut self) -> Result<Option<String>> {
        self.inner.execute()
    }

    pub fn execute_with(&mut self, flags: BulkFlags, max_rows: usize) -> Result<Option<String>> {
        self.inner.execute_with(flags, max_rows)
    }
}
