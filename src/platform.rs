//! Dialect differences between the supported database platforms.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{ColumnDescriptor, Value};

lazy_static::lazy_static! {
    static ref SIMPLE_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();

    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "all", "and", "as", "asc", "between", "by", "case", "check", "column", "default",
        "delete", "desc", "distinct", "else", "end", "from", "group", "having", "in",
        "index", "insert", "into", "is", "join", "key", "like", "limit", "not", "null",
        "on", "or", "order", "primary", "references", "select", "set", "table", "then",
        "to", "union", "update", "user", "values", "when", "where",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "mariadb")]
    Mysql,
    #[serde(alias = "postgres")]
    Postgresql,
    Sqlite,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }

    fn quote_char(&self) -> char {
        match self {
            Self::Mysql => '`',
            Self::Postgresql | Self::Sqlite => '"',
        }
    }

    /// Quotes a table or column name when it is a reserved word, is not a
    /// plain identifier, or was written pre-quoted in backticks.
    pub fn quote_identifier(&self, name: &str) -> String {
        let (bare, forced) = match name.strip_prefix('`').and_then(|n| n.strip_suffix('`')) {
            Some(inner) => (inner, true),
            None => (name, false),
        };

        let needs_quotes = forced
            || !SIMPLE_IDENTIFIER.is_match(bare)
            || RESERVED_WORDS.contains(bare.to_ascii_lowercase().as_str());
        if !needs_quotes {
            return bare.to_string();
        }

        let quote = self.quote_char();
        let escaped = bare.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Renders a value that can be inlined into statement text, or `None`
    /// when it has to be bound as a parameter.
    pub fn inline_literal(&self, value: &Value, column: Option<&ColumnDescriptor>) -> Option<String> {
        if let (Self::Postgresql, Some(column)) = (self, column) {
            if column.is_boolean() {
                return match value {
                    Value::Null => Some("NULL".to_string()),
                    Value::Boolean(b) => Some(self.boolean_literal(*b).to_string()),
                    Value::Integer(i) => Some(self.boolean_literal(*i != 0).to_string()),
                    _ => None,
                };
            }
        }

        match value {
            Value::Null => Some("NULL".to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) if f.is_finite() => Some(f.to_string()),
            Value::Boolean(b) => Some(self.boolean_literal(*b).to_string()),
            _ => None,
        }
    }

    pub fn boolean_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Postgresql, true) => "true",
            (Self::Postgresql, false) => "false",
            (_, true) => "1",
            (_, false) => "0",
        }
    }

    pub fn supports_copy(&self) -> bool {
        matches!(self, Self::Postgresql)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
