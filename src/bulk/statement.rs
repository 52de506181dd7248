//! Multi-row INSERT / UPSERT synthesis and the COPY text encoder.

use std::sync::Arc;

use tracing::debug;

use crate::core::{BulkError, ColumnDescriptor, Result, Row, Value};
use crate::executor::{Param, Params, Statement};
use crate::metadata::EntityMetadata;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Insert,
    Upsert,
}

/// Columns of one chunk: every field present in at least one row, in
/// first-seen order, followed by identifiers a generator can fill.
pub fn chunk_fields<'a>(metadata: &'a EntityMetadata, rows: &[&'a Row]) -> Vec<&'a str> {
    let mut fields: Vec<&str> = Vec::new();
    for row in rows {
        for name in row.keys() {
            if !fields.contains(&name.as_str()) {
                fields.push(name);
            }
        }
    }

    if metadata.generator().is_some() {
        for id in metadata.id_fields() {
            if !fields.contains(&id.as_str()) {
                fields.push(id);
            }
        }
    }
    fields
}

/// Builds one INSERT (or UPSERT) statement covering `rows`.
///
/// Placeholders are positional and bound row by row. A field missing from a
/// row binds `NULL`, except identifiers, which the class generator fills.
pub fn build_insert(
    metadata: &EntityMetadata,
    platform: Platform,
    rows: &[&Row],
    mode: InsertMode,
    ignore: bool,
) -> Result<Statement> {
    let fields = chunk_fields(metadata, rows);
    let columns = fields
        .iter()
        .map(|field| metadata.column(field).cloned())
        .collect::<Result<Vec<Arc<ColumnDescriptor>>>>()?;

    let mut params = Vec::with_capacity(rows.len() * fields.len());
    for row in rows {
        for (field, column) in fields.iter().zip(&columns) {
            let value = bind_value(metadata, row, field)?;
            params.push(Param::new(value, column.clone()));
        }
    }

    let quoted: Vec<String> = columns
        .iter()
        .map(|column| platform.quote_identifier(column.name()))
        .collect();
    let tuple = format!("({})", vec!["?"; fields.len()].join(", "));
    let tuples = vec![tuple.as_str(); rows.len()].join(", ");

    let verb = match (platform, mode, ignore) {
        (Platform::Mysql, _, true) => "INSERT IGNORE INTO",
        (Platform::Sqlite, InsertMode::Insert, true) => "INSERT OR IGNORE INTO",
        _ => "INSERT INTO",
    };

    let mut sql = format!(
        "{} {} ({}) VALUES {}",
        verb,
        platform.quote_identifier(metadata.table()),
        quoted.join(", "),
        tuples
    );

    match mode {
        InsertMode::Upsert => sql.push_str(&upsert_clause(metadata, platform, &quoted)),
        InsertMode::Insert if ignore && platform == Platform::Postgresql => {
            sql.push_str(" ON CONFLICT DO NOTHING")
        }
        InsertMode::Insert => {}
    }

    debug!(
        table = %metadata.table(),
        rows = rows.len(),
        columns = fields.len(),
        params = params.len(),
        "built insert statement"
    );
    Ok(Statement::new(sql, Params::Positional(params)))
}

fn upsert_clause(metadata: &EntityMetadata, platform: Platform, quoted: &[String]) -> String {
    match platform {
        Platform::Mysql => {
            let updates: Vec<String> = quoted
                .iter()
                .map(|column| format!("{column}=VALUES({column})"))
                .collect();
            format!(" ON DUPLICATE KEY UPDATE {}", updates.join(", "))
        }
        Platform::Postgresql | Platform::Sqlite => {
            let keys: Vec<String> = metadata
                .id_fields()
                .iter()
                .filter_map(|id| metadata.field(id))
                .map(|column| platform.quote_identifier(column.name()))
                .collect();
            let updates: Vec<String> = quoted
                .iter()
                .map(|column| format!("{column} = EXCLUDED.{column}"))
                .collect();
            format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                keys.join(", "),
                updates.join(", ")
            )
        }
    }
}

fn bind_value(metadata: &EntityMetadata, row: &Row, field: &str) -> Result<Value> {
    let value = row.get(field).cloned().unwrap_or(Value::Null);
    if value.is_null() && metadata.is_id_field(field) {
        if let Some(generator) = metadata.generator() {
            return generator.generate(metadata.class(), row);
        }
    }
    Ok(value)
}

/// Encodes `rows` for `COPY <table> (<columns>) FROM STDIN` in text format.
pub fn build_copy(
    metadata: &EntityMetadata,
    platform: Platform,
    rows: &[&Row],
) -> Result<(String, Vec<String>)> {
    if !platform.supports_copy() {
        return Err(BulkError::unsupported_platform(platform, "COPY"));
    }

    let fields = chunk_fields(metadata, rows);
    let mut quoted = Vec::with_capacity(fields.len());
    for field in &fields {
        quoted.push(platform.quote_identifier(metadata.column(field)?.name()));
    }

    let command = format!(
        "COPY {} ({}) FROM STDIN",
        platform.quote_identifier(metadata.table()),
        quoted.join(", ")
    );

    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(fields.len());
        for field in &fields {
            cells.push(copy_cell(&bind_value(metadata, row, field)?));
        }
        lines.push(cells.join("\t"));
    }

    debug!(table = %metadata.table(), lines = lines.len(), "encoded copy rows");
    Ok((command, lines))
}

fn copy_cell(value: &Value) -> String {
    match value {
        Value::Null => "\\N".to_string(),
        Value::Boolean(true) => "t".to_string(),
        Value::Boolean(false) => "f".to_string(),
        other => escape_copy(&other.to_string()),
    }
}

fn escape_copy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{BulkGenerator, HashedIdGenerator, simple_hash};

    fn book() -> EntityMetadata {
        EntityMetadata::builder("Book", "book")
            .field("id", ColumnDescriptor::new("id", "integer").nullable(true).with_default(Value::Null))
            .field("title", ColumnDescriptor::new("title", "string"))
            .field("order", ColumnDescriptor::new("order", "integer").nullable(true))
            .id_field("id")
            .build()
            .unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_heterogeneous_rows_share_columns() {
        let metadata = book();
        let a = row(&[("title", Value::from("a"))]);
        let b = row(&[("order", Value::Integer(2)), ("title", Value::from("b"))]);

        let statement = build_insert(&metadata, Platform::Mysql, &[&a, &b], InsertMode::Insert, false).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO book (title, `order`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(
            statement.params.values(),
            vec![&Value::from("a"), &Value::Null, &Value::from("b"), &Value::Integer(2)]
        );
    }

    #[test]
    fn test_ignore_and_upsert_per_platform() {
        let metadata = book();
        let a = row(&[("id", Value::Integer(1)), ("title", Value::from("a"))]);
        let rows = [&a];

        let sql = |platform, mode, ignore| build_insert(&metadata, platform, &rows, mode, ignore).unwrap().sql;

        assert_eq!(
            sql(Platform::Mysql, InsertMode::Insert, true),
            "INSERT IGNORE INTO book (id, title) VALUES (?, ?)"
        );
        assert_eq!(
            sql(Platform::Mysql, InsertMode::Upsert, false),
            "INSERT INTO book (id, title) VALUES (?, ?) ON DUPLICATE KEY UPDATE id=VALUES(id), title=VALUES(title)"
        );
        assert_eq!(
            sql(Platform::Postgresql, InsertMode::Insert, true),
            "INSERT INTO book (id, title) VALUES (?, ?) ON CONFLICT DO NOTHING"
        );
        assert_eq!(
            sql(Platform::Postgresql, InsertMode::Upsert, false),
            "INSERT INTO book (id, title) VALUES (?, ?) ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id, title = EXCLUDED.title"
        );
        assert_eq!(
            sql(Platform::Sqlite, InsertMode::Insert, true),
            "INSERT OR IGNORE INTO book (id, title) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_generator_fills_missing_ids_at_bind_time() {
        let metadata = EntityMetadata::builder("Tag", "tag")
            .field("id", ColumnDescriptor::new("id", "string").nullable(true).with_default(Value::Null))
            .field("name", ColumnDescriptor::new("name", "string"))
            .id_field("id")
            .generator(BulkGenerator::new(Arc::new(HashedIdGenerator::new(["name"]))).unwrap())
            .build()
            .unwrap();
        let a = row(&[("name", Value::from("rust"))]);
        let b = row(&[("name", Value::from("sql")), ("id", Value::from("fixed"))]);

        let statement = build_insert(&metadata, Platform::Mysql, &[&a, &b], InsertMode::Insert, false).unwrap();
        assert_eq!(statement.sql, "INSERT INTO tag (name, id) VALUES (?, ?), (?, ?)");
        assert_eq!(
            statement.params.values(),
            vec![
                &Value::from("rust"),
                &Value::Text(simple_hash(["rust"])),
                &Value::from("sql"),
                &Value::from("fixed"),
            ]
        );
    }

    #[test]
    fn test_copy_encoding() {
        let metadata = book();
        let a = row(&[("id", Value::Integer(1)), ("title", Value::from("tab\there\\"))]);
        let b = row(&[("id", Value::Integer(2)), ("title", Value::from("line\nbreak"))]);

        let (command, lines) = build_copy(&metadata, Platform::Postgresql, &[&a, &b]).unwrap();
        assert_eq!(command, "COPY book (id, title) FROM STDIN");
        assert_eq!(lines, vec!["1\ttab\\there\\\\".to_string(), "2\tline\\nbreak".to_string()]);

        let c = row(&[("order", Value::Null), ("title", Value::from("x"))]);
        let (command, lines) = build_copy(&metadata, Platform::Postgresql, &[&c]).unwrap();
        assert_eq!(command, "COPY book (\"order\", title) FROM STDIN");
        assert_eq!(lines, vec!["\\N\tx".to_string()]);
    }

    #[test]
    fn test_copy_is_postgres_only() {
        let metadata = book();
        let a = row(&[("title", Value::from("x"))]);
        assert!(matches!(
            build_copy(&metadata, Platform::Mysql, &[&a]),
            Err(BulkError::UnsupportedPlatform { .. })
        ));
    }
}
