// ============================================================================
// bulkmut: bulk mutation engine
// ============================================================================

// Lets `#[derive(BulkEntity)]` expand to `::bulkmut::...` inside this crate too.
extern crate self as bulkmut;

pub mod bulk;
pub mod config;
pub mod core;
pub mod entity;
pub mod executor;
pub mod generator;
pub mod metadata;
pub mod platform;

pub use bulkmut_derive::BulkEntity;

pub use bulk::{BulkFlags, BulkInsert, BulkUpdate, BulkUpsert, DEFAULT_ROWS, ValueQueue};
pub use config::BulkConfig;
pub use core::{BulkError, ColumnDescriptor, Result, Row, Value};
pub use entity::{Entity, EntityClass, EntityRef, FieldExtractor, FieldValue, Slot, ToFieldValue};
pub use executor::{
    EntityState, Executor, Param, Params, RecordingExecutor, Statement, UnitOfWork,
};
pub use generator::{BulkGenerator, BulkIdGenerator, HashedIdGenerator, IdGenerator, simple_hash};
pub use metadata::{
    AssociationKind, AssociationMapping, ClassMapping, EntityMetadata, FieldMapping,
    JoinColumnMapping, LifecycleEvent, MetadataCache, MetadataProvider, MetadataResolver,
    StaticMetadataProvider,
};
pub use platform::Platform;

/// Builds a [`Row`] from `field => value` pairs.
///
/// ```
/// use bulkmut::{row, Value};
///
/// let r = row! { "title" => "Dune", "year" => 1965 };
/// assert_eq!(r.get("year"), Some(&Value::Integer(1965)));
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $( row.insert(::std::string::String::from($field), $crate::Value::from($value)); )+
        row
    }};
}
