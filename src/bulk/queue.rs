use std::sync::Arc;

use tracing::trace;

use crate::core::{BulkError, ColumnDescriptor, Result, Row, Value};
use crate::entity::{Entity, FieldExtractor, FieldValue};
use crate::executor::{EntityState, UnitOfWork};
use crate::metadata::{EntityMetadata, LifecycleEvent};

/// Pending rows of one bulk insert or upsert, validated against the class
/// metadata as they are added.
pub struct ValueQueue {
    metadata: Arc<EntityMetadata>,
    extractor: FieldExtractor,
    unit_of_work: Option<Arc<dyn UnitOfWork>>,
    rows: Vec<Row>,
}

impl ValueQueue {
    pub fn new(metadata: Arc<EntityMetadata>) -> Self {
        let extractor = FieldExtractor::new(metadata.class());
        Self {
            metadata,
            extractor,
            unit_of_work: None,
            rows: Vec::new(),
        }
    }

    pub fn set_unit_of_work(&mut self, unit_of_work: Arc<dyn UnitOfWork>) {
        self.unit_of_work = Some(unit_of_work);
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Drops the first `count` rows, e.g. those already written.
    pub fn discard(&mut self, count: usize) {
        let count = count.min(self.rows.len());
        self.rows.drain(..count);
    }

    /// Queues a raw field map. Every key must be a mapped field and every
    /// non-nullable field must be present with a non-null value. Fields left
    /// out stay unset for this row.
    pub fn add_value(&mut self, values: Row) -> Result<()> {
        let class = self.metadata.class();
        let mut row = Row::with_capacity(values.len());
        for (name, value) in values {
            let column = self.metadata.column(&name)?;
            let value = normalize_raw(&mut self.extractor, class, &name, column, value)?;
            row.insert(name, value);
        }

        for (name, column) in self.metadata.fields() {
            if column.is_nullable() {
                continue;
            }
            match row.get(name) {
                Some(value) if !value.is_null() => {}
                _ => return Err(BulkError::null_value(class, name)),
            }
        }

        self.rows.push(row);
        Ok(())
    }

    /// Queues every mapped field of `entity`.
    pub fn add_entity(&mut self, entity: &mut dyn Entity) -> Result<()> {
        self.check_class(entity)?;
        self.run_callbacks(entity)?;

        let metadata = self.metadata.clone();
        let mut row = Row::with_capacity(metadata.field_count());
        for (name, column) in metadata.fields() {
            let value = self.extract(&*entity, name, column)?;
            row.insert(name.to_string(), value);
        }

        self.generate_ids(&mut row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Queues only the listed fields of `entity`, plus identifiers.
    pub fn add_entity_fields(&mut self, entity: &mut dyn Entity, fields: &[&str]) -> Result<()> {
        self.check_class(entity)?;
        for field in fields {
            self.metadata.column(field)?;
        }
        self.run_callbacks(entity)?;

        let metadata = self.metadata.clone();
        let mut row = Row::with_capacity(fields.len() + metadata.id_fields().len());
        for (name, column) in metadata.fields() {
            if !fields.contains(&name) && !metadata.is_id_field(name) {
                continue;
            }
            let value = self.extract(&*entity, name, column)?;
            row.insert(name.to_string(), value);
        }

        self.generate_ids(&mut row)?;
        self.rows.push(row);
        Ok(())
    }

    fn check_class(&self, entity: &dyn Entity) -> Result<()> {
        if entity.class_name() != self.metadata.class() {
            return Err(BulkError::WrongEntity {
                expected: self.metadata.class().to_string(),
                actual: entity.class_name().to_string(),
            });
        }
        Ok(())
    }

    fn run_callbacks(&self, entity: &mut dyn Entity) -> Result<()> {
        if !self.metadata.has_callbacks() {
            return Ok(());
        }

        let state = match &self.unit_of_work {
            Some(unit_of_work) => unit_of_work
                .entity_state(&*entity)
                .unwrap_or(EntityState::New),
            None => EntityState::New,
        };
        let event = match state {
            EntityState::New => LifecycleEvent::PrePersist,
            EntityState::Managed => LifecycleEvent::PreUpdate,
            EntityState::Detached | EntityState::Removed => return Ok(()),
        };

        for callback in self.metadata.callbacks(event) {
            trace!(class = %self.metadata.class(), callback = %callback, "lifecycle callback");
            entity.invoke_callback(callback)?;
        }
        Ok(())
    }

    fn extract(&mut self, entity: &dyn Entity, name: &str, column: &ColumnDescriptor) -> Result<Value> {
        let class = self.metadata.class();
        let value = match self.extractor.extract(entity, name, column)? {
            FieldValue::Initialized(value) => value,
            FieldValue::NotInitialized if column.has_default() => column.default_value().clone(),
            FieldValue::NotInitialized => return Err(BulkError::no_default_value(class, name)),
        };

        column.check_null(class, name, &value)?;
        reject_object(class, name, &value)?;
        Ok(value)
    }

    fn generate_ids(&self, row: &mut Row) -> Result<()> {
        let Some(generator) = self.metadata.generator() else {
            return Ok(());
        };
        for id in self.metadata.id_fields() {
            let missing = row.get(id).map(Value::is_null).unwrap_or(true);
            if missing {
                let value = generator.generate(self.metadata.class(), row)?;
                row.insert(id.clone(), value);
            }
        }
        Ok(())
    }
}

/// Checks one supplied value: related objects on join columns are replaced by
/// their referenced key, explicit nulls must be allowed by the column.
pub(crate) fn normalize_raw(
    extractor: &mut FieldExtractor,
    class: &str,
    name: &str,
    column: &ColumnDescriptor,
    value: Value,
) -> Result<Value> {
    let value = if column.is_join() {
        match extractor.resolve_joined(column, FieldValue::Initialized(value), name)? {
            FieldValue::Initialized(value) => value,
            FieldValue::NotInitialized => return Err(BulkError::no_default_value(class, name)),
        }
    } else {
        value
    };

    column.check_null(class, name, &value)?;
    reject_object(class, name, &value)?;
    Ok(value)
}

pub(crate) fn reject_object(class: &str, name: &str, value: &Value) -> Result<()> {
    if let Value::Entity(object) = value {
        return Err(BulkError::UnsupportedValue {
            class: class.to_string(),
            field: name.to_string(),
            reason: format!("object {} cannot be stored in a plain column", object),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRef, Slot, ToFieldValue};
    use crate::generator::{BulkGenerator, HashedIdGenerator};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Author {
        id: Slot<i64>,
    }

    impl Entity for Author {
        fn class_name(&self) -> &'static str {
            "Author"
        }

        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "id" => Some(self.id.to_field_value()),
                _ => None,
            }
        }
    }

    #[derive(Debug, Default)]
    struct Book {
        id: Slot<i64>,
        title: Slot<String>,
        rating: Slot<i64>,
        author: Option<Arc<Author>>,
        log: Vec<String>,
    }

    impl Entity for Book {
        fn class_name(&self) -> &'static str {
            "Book"
        }

        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "id" => Some(self.id.to_field_value()),
                "title" => Some(self.title.to_field_value()),
                "rating" => Some(self.rating.to_field_value()),
                "author" => Some(self.author.to_field_value()),
                _ => None,
            }
        }

        fn invoke_callback(&mut self, name: &str) -> Result<()> {
            self.log.push(name.to_string());
            Ok(())
        }
    }

    fn metadata() -> Arc<EntityMetadata> {
        Arc::new(
            EntityMetadata::builder("Book", "book")
                .field("id", ColumnDescriptor::new("id", "integer").nullable(true).with_default(Value::Null))
                .field("title", ColumnDescriptor::new("title", "string"))
                .field("rating", ColumnDescriptor::new("rating", "integer").with_default(Value::Integer(3)))
                .field("author", ColumnDescriptor::join("author_id", "id", true))
                .id_field("id")
                .callbacks(LifecycleEvent::PrePersist, vec!["onCreate".into()])
                .callbacks(LifecycleEvent::PreUpdate, vec!["onUpdate".into()])
                .build()
                .unwrap(),
        )
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_add_value_validates_fields() {
        let mut queue = ValueQueue::new(metadata());

        let err = queue
            .add_value(row(&[("title", Value::from("x")), ("isbn", Value::from("1"))]))
            .unwrap_err();
        assert_eq!(err, BulkError::field_not_found("Book", "isbn"));

        let err = queue.add_value(row(&[("id", Value::Integer(1))])).unwrap_err();
        assert_eq!(err, BulkError::null_value("Book", "title"));

        let err = queue
            .add_value(row(&[("title", Value::Null), ("rating", Value::Integer(1))]))
            .unwrap_err();
        assert_eq!(err, BulkError::null_value("Book", "title"));

        assert!(queue.is_empty());
    }

    #[test]
    fn test_add_value_dereferences_joins() {
        let mut queue = ValueQueue::new(metadata());
        let author = EntityRef::new(Author { id: Slot::Set(7) });
        queue
            .add_value(row(&[
                ("title", Value::from("x")),
                ("rating", Value::Integer(5)),
                ("author", Value::Entity(author)),
            ]))
            .unwrap();

        assert_eq!(queue.rows()[0].get("author"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_add_entity_applies_defaults() {
        let mut queue = ValueQueue::new(metadata());
        let mut book = Book {
            title: Slot::Set("Dune".into()),
            ..Default::default()
        };
        queue.add_entity(&mut book).unwrap();

        let queued = &queue.rows()[0];
        assert_eq!(queued.get("id"), Some(&Value::Null));
        assert_eq!(queued.get("rating"), Some(&Value::Integer(3)));
        assert_eq!(queued.get("author"), Some(&Value::Null));
        assert_eq!(book.log, vec!["onCreate".to_string()]);
    }

    #[test]
    fn test_add_entity_without_default_fails() {
        let mut queue = ValueQueue::new(metadata());
        let mut book = Book::default();
        assert_eq!(
            queue.add_entity(&mut book).unwrap_err(),
            BulkError::no_default_value("Book", "title")
        );
    }

    #[test]
    fn test_unsaved_related_entity_has_no_key() {
        let mut queue = ValueQueue::new(metadata());
        let mut book = Book {
            title: Slot::Set("Dune".into()),
            author: Some(Arc::new(Author::default())),
            ..Default::default()
        };
        assert_eq!(
            queue.add_entity(&mut book).unwrap_err(),
            BulkError::no_default_value("Book", "author")
        );
    }

    #[test]
    fn test_wrong_entity() {
        let mut queue = ValueQueue::new(metadata());
        let mut author = Author::default();
        assert_eq!(
            queue.add_entity(&mut author).unwrap_err(),
            BulkError::WrongEntity {
                expected: "Book".into(),
                actual: "Author".into()
            }
        );
    }

    struct AllManaged(Mutex<usize>);

    impl UnitOfWork for AllManaged {
        fn entity_state(&self, _entity: &dyn Entity) -> Result<EntityState> {
            *self.0.lock()? += 1;
            Ok(EntityState::Managed)
        }
    }

    #[test]
    fn test_managed_entities_run_pre_update() {
        let mut queue = ValueQueue::new(metadata());
        let unit_of_work = Arc::new(AllManaged(Mutex::new(0)));
        queue.set_unit_of_work(unit_of_work.clone());

        let mut book = Book {
            title: Slot::Set("Dune".into()),
            ..Default::default()
        };
        queue.add_entity(&mut book).unwrap();

        assert_eq!(book.log, vec!["onUpdate".to_string()]);
        assert_eq!(*unit_of_work.0.lock().unwrap(), 1);
    }

    #[test]
    fn test_generator_runs_at_queue_time() {
        let metadata = Arc::new(
            EntityMetadata::builder("Book", "book")
                .field("id", ColumnDescriptor::new("id", "string").nullable(true).with_default(Value::Null))
                .field("title", ColumnDescriptor::new("title", "string"))
                .id_field("id")
                .generator(BulkGenerator::new(Arc::new(HashedIdGenerator::new(["title"]))).unwrap())
                .build()
                .unwrap(),
        );
        let mut queue = ValueQueue::new(metadata);
        let mut book = Book {
            title: Slot::Set("Dune".into()),
            ..Default::default()
        };
        queue.add_entity_fields(&mut book, &["title"]).unwrap();

        let id = queue.rows()[0].get("id").cloned().unwrap();
        assert_eq!(id, Value::Text(crate::generator::simple_hash(["Dune"])));
    }

    #[test]
    fn test_add_entity_fields_limits_row() {
        let mut queue = ValueQueue::new(metadata());
        let mut book = Book {
            id: Slot::Set(4),
            title: Slot::Set("Dune".into()),
            ..Default::default()
        };
        queue.add_entity_fields(&mut book, &["title"]).unwrap();

        let keys: Vec<_> = queue.rows()[0].keys().cloned().collect();
        assert_eq!(keys, vec!["id".to_string(), "title".to_string()]);

        assert!(matches!(
            queue.add_entity_fields(&mut book, &["isbn"]),
            Err(BulkError::FieldNotFound { .. })
        ));
    }
}
