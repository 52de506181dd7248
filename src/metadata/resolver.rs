use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use lazy_static::lazy_static;
use tracing::{debug, trace};

use super::mapping::{ClassMapping, MetadataProvider};
use super::EntityMetadata;
use crate::core::{ColumnDescriptor, Result, Value};
use crate::entity::EntityClass;
use crate::generator::BulkGenerator;

/// Translates raw class mappings into [`EntityMetadata`].
pub struct MetadataResolver;

impl MetadataResolver {
    pub fn build(mapping: &ClassMapping) -> Result<EntityMetadata> {
        let mut builder = EntityMetadata::builder(&mapping.class, &mapping.table);

        for field in &mapping.fields {
            let is_id = mapping.identifier.iter().any(|id| id == &field.field);
            let mut column = ColumnDescriptor::new(field.column_name(), &field.logical_type);

            // Identifiers may be left empty for the database or a generator to fill.
            if is_id {
                column = column.nullable(true).with_default(Value::Null);
            } else {
                column = column.nullable(field.nullable.unwrap_or(false));
                if let Some(default) = &field.options.default {
                    column = column.with_default(Value::from_json(default));
                }
            }

            builder = builder.field(&field.field, column);
        }

        for association in &mapping.associations {
            if !association.kind.is_supported() {
                trace!(class = %mapping.class, field = %association.field, kind = ?association.kind, "skipping association");
                continue;
            }
            let Some(join) = association.join_columns.first() else {
                debug!(class = %mapping.class, field = %association.field, "association without join column, skipped");
                continue;
            };

            let nullable = match association.kind {
                super::AssociationKind::OneToOne => true,
                _ => join.nullable.unwrap_or(true),
            };
            builder = builder.field(
                &association.field,
                ColumnDescriptor::join(&join.name, &join.referenced_column, nullable),
            );
        }

        for id in &mapping.identifier {
            builder = builder.id_field(id);
        }

        if let Some(definition) = &mapping.generator {
            builder = builder.generator(BulkGenerator::new(definition.0.clone())?);
        }

        for (event, names) in &mapping.lifecycle_callbacks {
            builder = builder.callbacks(*event, names.clone());
        }

        builder.build()
    }
}

lazy_static! {
    static ref GLOBAL_METADATA_CACHE: MetadataCache = MetadataCache::new();
}

/// Resolve-once memoizer of entity metadata, keyed by class name.
///
/// Lookups take a read lock only. A miss takes the writer mutex, checks again
/// and resolves, so concurrent first uses of one class read the provider once.
/// Entries are never invalidated.
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<EntityMetadata>>>,
    resolving: Mutex<()>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            resolving: Mutex::new(()),
        }
    }

    /// Process-wide cache shared by every bulk operation.
    pub fn global() -> &'static MetadataCache {
        &GLOBAL_METADATA_CACHE
    }

    pub fn get(&self, class: &str) -> Result<Option<Arc<EntityMetadata>>> {
        Ok(self.entries.read()?.get(class).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn resolve(&self, provider: &dyn MetadataProvider, class: &str) -> Result<Arc<EntityMetadata>> {
        if let Some(hit) = self.get(class)? {
            trace!(class = %class, "metadata cache hit");
            return Ok(hit);
        }

        let _guard = self.resolving.lock()?;
        if let Some(hit) = self.get(class)? {
            return Ok(hit);
        }

        debug!(class = %class, "metadata cache miss, resolving");
        let mapping = provider.class_mapping(class)?;
        let metadata = Arc::new(MetadataResolver::build(&mapping)?);

        self.entries
            .write()?
            .insert(class.to_string(), metadata.clone());
        Ok(metadata)
    }

    pub fn resolve_class<E: EntityClass>(&self, provider: &dyn MetadataProvider) -> Result<Arc<EntityMetadata>> {
        self.resolve(provider, E::CLASS)
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
