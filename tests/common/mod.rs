#![allow(dead_code)]

use std::sync::Arc;

use bulkmut::{
    BulkEntity, ClassMapping, EntityMetadata, FieldMapping, HashedIdGenerator, LifecycleEvent,
    MetadataProvider, MetadataResolver, Platform, RecordingExecutor, Slot, StaticMetadataProvider,
};
use tracing_subscriber::EnvFilter;

pub const MAPPINGS: &str = r#"[
    {
        "class": "Book",
        "table": "book",
        "identifier": ["id"],
        "fields": [
            { "field": "id", "type": "integer" },
            { "field": "title", "type": "string" },
            { "field": "shortText", "column": "short_text", "type": "text", "nullable": true },
            { "field": "rating", "type": "integer", "options": { "default": 3 } }
        ],
        "associations": [
            {
                "field": "author",
                "kind": "many_to_one",
                "join_columns": [{ "name": "author_id", "referenced_column": "id", "nullable": true }]
            }
        ]
    },
    {
        "class": "Author",
        "table": "author",
        "identifier": ["id"],
        "fields": [
            { "field": "id", "type": "integer" },
            { "field": "name", "type": "string" }
        ],
        "associations": [
            { "field": "books", "kind": "one_to_many" }
        ]
    }
]"#;

#[derive(Debug, Default, BulkEntity)]
#[bulk(class = "Author")]
pub struct Author {
    pub id: Slot<i64>,
    pub name: Slot<String>,
}

#[derive(Debug, Default, BulkEntity)]
#[bulk(class = "Book")]
pub struct Book {
    pub id: Slot<i64>,
    pub title: Slot<String>,
    #[bulk(rename = "shortText")]
    pub short_text: Slot<Option<String>>,
    pub rating: Slot<i64>,
    pub author: Slot<Option<Arc<Author>>>,
    #[bulk(skip)]
    pub dirty: bool,
}

impl Book {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Slot::Set(title.to_string()),
            ..Default::default()
        }
    }
}

/// Shared audit fields, looked up when `Magazine` itself has no such field.
#[derive(Debug, Default, BulkEntity)]
#[bulk(class = "Stamps", callbacks(touch))]
pub struct Stamps {
    pub created: Slot<String>,
    #[bulk(skip)]
    pub touched: u32,
}

impl Stamps {
    fn touch(&mut self) {
        self.touched += 1;
        if !self.created.is_set() {
            self.created.set("2026-01-01".to_string());
        }
    }
}

#[derive(Debug, Default, BulkEntity)]
#[bulk(class = "Magazine")]
pub struct Magazine {
    pub id: Slot<String>,
    pub title: Slot<String>,
    pub issue: Slot<i64>,
    #[bulk(parent)]
    pub stamps: Stamps,
}

pub fn magazine_mapping() -> ClassMapping {
    ClassMapping::new("Magazine", "magazine")
        .identifier(["id"])
        .field(FieldMapping::new("id", "string"))
        .field(FieldMapping::new("title", "string"))
        .field(FieldMapping::new("issue", "integer"))
        .field(FieldMapping::new("created", "string"))
        .callback(LifecycleEvent::PrePersist, "touch")
        .generator(Arc::new(HashedIdGenerator::new(["title", "issue"])))
}

pub fn provider() -> StaticMetadataProvider {
    StaticMetadataProvider::from_json(MAPPINGS)
        .expect("fixture mappings parse")
        .with_mapping(magazine_mapping())
}

/// Metadata built outside the process-wide cache, so tests stay independent.
pub fn metadata(class: &str) -> Arc<EntityMetadata> {
    let mapping = provider().class_mapping(class).expect("fixture class exists");
    Arc::new(MetadataResolver::build(&mapping).expect("fixture mapping resolves"))
}

pub fn executor(platform: Platform) -> Arc<RecordingExecutor> {
    Arc::new(RecordingExecutor::new(platform))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
