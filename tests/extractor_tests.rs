mod common;

use std::sync::Arc;

use bulkmut::{BulkError, FieldExtractor, FieldValue, Slot, Value};
use common::{Author, Book, Magazine, Stamps};

#[test]
fn test_unsaved_join_target_is_not_initialized() {
    let metadata = common::metadata("Book");
    let column = metadata.field("author").unwrap();
    let mut extractor = FieldExtractor::new("Book");

    let mut book = Book::titled("Dune");
    book.author = Slot::Set(Some(Arc::new(Author::default())));

    assert_eq!(
        extractor.extract(&book, "author", column).unwrap(),
        FieldValue::NotInitialized
    );
}

#[test]
fn test_join_dereferences_to_referenced_field() {
    let metadata = common::metadata("Book");
    let column = metadata.field("author").unwrap();
    let mut extractor = FieldExtractor::new("Book");

    let mut book = Book::titled("Dune");
    book.author = Slot::Set(Some(Arc::new(Author {
        id: Slot::Set(42),
        name: Slot::Set("Herbert".into()),
    })));

    assert_eq!(
        extractor.extract(&book, "author", column).unwrap(),
        FieldValue::Initialized(Value::Integer(42))
    );

    book.author = Slot::Set(None);
    assert_eq!(
        extractor.extract(&book, "author", column).unwrap(),
        FieldValue::Initialized(Value::Null)
    );

    book.author = Slot::Unset;
    assert_eq!(
        extractor.extract(&book, "author", column).unwrap(),
        FieldValue::NotInitialized
    );
}

#[test]
fn test_dotted_paths() {
    let mut extractor = FieldExtractor::new("Book");
    let mut book = Book::titled("Dune");

    book.author = Slot::Set(Some(Arc::new(Author {
        id: Slot::Set(1),
        name: Slot::Set("Herbert".into()),
    })));
    assert_eq!(
        extractor.resolve(&book, "author.name").unwrap(),
        FieldValue::Initialized(Value::from("Herbert"))
    );

    book.author = Slot::Unset;
    assert_eq!(
        extractor.resolve(&book, "author.name").unwrap(),
        FieldValue::NotInitialized
    );

    assert!(matches!(
        extractor.resolve(&book, "title.length"),
        Err(BulkError::FieldNotFound { .. })
    ));
}

#[test]
fn test_renamed_skipped_and_parent_fields() {
    let mut extractor = FieldExtractor::new("Magazine");
    let magazine = Magazine {
        title: Slot::Set("Wired".into()),
        stamps: Stamps {
            created: Slot::Set("2026-02-02".into()),
            touched: 0,
        },
        ..Default::default()
    };

    assert_eq!(
        extractor.resolve(&magazine, "created").unwrap(),
        FieldValue::Initialized(Value::from("2026-02-02"))
    );
    assert!(matches!(
        extractor.resolve(&magazine, "touched"),
        Err(BulkError::FieldNotFound { .. })
    ));

    let mut book_extractor = FieldExtractor::new("Book");
    let mut book = Book::titled("Dune");
    book.short_text = Slot::Set(Some("spice".into()));
    assert_eq!(
        book_extractor.resolve(&book, "shortText").unwrap(),
        FieldValue::Initialized(Value::from("spice"))
    );
    assert!(book_extractor.resolve(&book, "short_text").is_err());
    assert!(book_extractor.resolve(&book, "dirty").is_err());
}
