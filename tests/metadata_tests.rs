mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bulkmut::{
    BulkError, BulkInsert, BulkUpdate, BulkUpsert, ClassMapping, IdGenerator, MetadataCache,
    MetadataProvider, Platform, Result, StaticMetadataProvider, Value,
};
use common::Book;

struct CountingProvider {
    inner: StaticMetadataProvider,
    reads: AtomicUsize,
}

impl MetadataProvider for CountingProvider {
    fn class_mapping(&self, class: &str) -> Result<ClassMapping> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.class_mapping(class)
    }
}

#[test]
fn test_resolution_is_cached_per_class() {
    let provider = CountingProvider {
        inner: common::provider(),
        reads: AtomicUsize::new(0),
    };
    let cache = MetadataCache::new();

    let first = cache.resolve_class::<Book>(&provider).unwrap();
    let second = cache.resolve(&provider, "Book").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.reads.load(Ordering::SeqCst), 1);

    cache.resolve(&provider, "Author").unwrap();
    assert_eq!(provider.reads.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len().unwrap(), 2);
}

#[test]
fn test_operations_share_global_metadata() {
    let provider = common::provider();
    let executor = common::executor(Platform::Mysql);

    let insert = BulkInsert::for_class::<Book>(&provider, executor.clone()).unwrap();
    let upsert = BulkUpsert::for_class::<Book>(&provider, executor.clone()).unwrap();
    let update = BulkUpdate::for_class::<Book>(&provider, executor).unwrap();

    assert!(Arc::ptr_eq(insert.metadata(), upsert.metadata()));
    assert!(Arc::ptr_eq(insert.metadata(), update.metadata()));
    assert!(MetadataCache::global().get("Book").unwrap().is_some());
}

#[test]
fn test_resolved_book_metadata() {
    let metadata = common::metadata("Book");

    assert_eq!(metadata.table(), "book");
    assert_eq!(metadata.id_fields(), ["id".to_string()]);

    let names: Vec<_> = metadata.fields().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["id", "title", "shortText", "rating", "author"]);

    let id = metadata.field("id").unwrap();
    assert!(id.is_nullable() && id.has_default());

    let rating = metadata.field("rating").unwrap();
    assert!(!rating.is_nullable());
    assert_eq!(rating.default_value(), &Value::Integer(3));

    let author = metadata.field("author").unwrap();
    assert_eq!(author.name(), "author_id");
    assert_eq!(author.referenced(), Some("id"));
    assert!(author.is_nullable());

    // one-to-many has no join column here
    assert!(!common::metadata("Author").has_field("books"));
}

#[test]
fn test_generator_without_bulk_support() {
    struct Sequence;
    impl IdGenerator for Sequence {
        fn name(&self) -> &str {
            "sequence"
        }
    }

    let provider = StaticMetadataProvider::new()
        .with_mapping(common::magazine_mapping().generator(Arc::new(Sequence)));
    let err = MetadataCache::new().resolve(&provider, "Magazine").unwrap_err();
    assert_eq!(err, BulkError::UnsupportedGenerator("sequence".into()));
}

#[test]
fn test_unknown_class() {
    let cache = MetadataCache::new();
    assert_eq!(
        cache.resolve(&common::provider(), "Ghost").unwrap_err(),
        BulkError::ClassNotFound("Ghost".into())
    );
}
