pub mod error;
pub mod types;
pub mod value;

pub use error::{BulkError, Result};
pub use types::{ColumnDescriptor, Row};
pub use value::Value;
