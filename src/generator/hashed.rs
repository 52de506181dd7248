use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::{BulkIdGenerator, IdGenerator};
use crate::core::{BulkError, Result, Row, Value};

/// Width of a hashed primary key (`char(25)`).
pub const HASH_WIDTH: usize = 25;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Joins the parts with `_`, hashes them and re-encodes the first 128 bits
/// of the digest in base 36, left-padded to [`HASH_WIDTH`].
///
/// The digest is SHA-256, so keys differ from those of md5-based hashed
/// generators; tables already filled by one must not be extended with the other.
pub fn simple_hash<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("_");

    let digest = Sha256::digest(joined.as_bytes());
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);

    let encoded = to_base36(u128::from_be_bytes(head));
    format!("{:0>width$}", encoded, width = HASH_WIDTH)
}

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(HASH_WIDTH);
    while n > 0 {
        out.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn hash_part(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Boolean(true) => "1".to_string(),
        Value::Boolean(false) => "0".to_string(),
        other => other.to_string(),
    }
}

type FieldTransform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Content-derived identifiers: the configured source fields of a row are
/// hashed with [`simple_hash`].
#[derive(Clone)]
pub struct HashedIdGenerator {
    fields: Vec<String>,
    transforms: HashMap<String, FieldTransform>,
}

impl HashedIdGenerator {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            transforms: HashMap::new(),
        }
    }

    /// Maps a source value before it is hashed, e.g. to lowercase a title.
    pub fn with_transform<F>(mut self, field: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transforms.insert(field.into(), Arc::new(transform));
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl BulkIdGenerator for HashedIdGenerator {
    fn generate_bulk(&self, class: &str, row: &Row) -> Result<Value> {
        if self.fields.is_empty() {
            return Err(BulkError::EntityNotSupported(class.to_string()));
        }

        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = row
                .get(field)
                .ok_or_else(|| BulkError::cannot_generate_id(class, field))?;
            let value = match self.transforms.get(field) {
                Some(transform) => transform(value),
                None => value.clone(),
            };
            parts.push(hash_part(&value));
        }

        Ok(Value::Text(simple_hash(parts)))
    }
}

impl IdGenerator for HashedIdGenerator {
    fn name(&self) -> &str {
        "hashed"
    }

    fn as_bulk(&self) -> Option<&dyn BulkIdGenerator> {
        Some(self)
    }
}

impl fmt::Debug for HashedIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedIdGenerator")
            .field("fields", &self.fields)
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}
