use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BulkError {
    #[error("Field \"{field}\" not found in \"{class}\"")]
    FieldNotFound { class: String, field: String },

    #[error("Null does not allow in field \"{field}\" of \"{class}\"")]
    NullValue { class: String, field: String },

    #[error("No default value for field \"{field}\" of \"{class}\"")]
    NoDefaultValue { class: String, field: String },

    #[error("Bulk operation created for \"{expected}\", but \"{actual}\" added")]
    WrongEntity { expected: String, actual: String },

    #[error("Generator \"{0}\" does not support bulk id generation")]
    UnsupportedGenerator(String),

    #[error("Cannot generate id for \"{class}\": required field \"{field}\" does not exist")]
    CannotGenerateId { class: String, field: String },

    #[error("Entity \"{0}\" is not supported by this generator")]
    EntityNotSupported(String),

    #[error("Feature \"{feature}\" is not supported on platform {platform}")]
    UnsupportedPlatform { platform: String, feature: String },

    #[error(
        "Cannot change key field in \"{class}\" from \"{current}\" to \"{requested}\", because rows are already queued"
    )]
    CannotChangeKeyField {
        class: String,
        current: String,
        requested: String,
    },

    #[error("Unsupported value in field \"{field}\" of \"{class}\": {reason}")]
    UnsupportedValue {
        class: String,
        field: String,
        reason: String,
    },

    #[error("Lifecycle callback \"{callback}\" is not defined on \"{class}\"")]
    CallbackNotFound { class: String, callback: String },

    #[error("Class '{0}' not found in metadata provider")]
    ClassNotFound(String),

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, BulkError>;

impl BulkError {
    pub fn field_not_found(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn null_value(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NullValue {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn no_default_value(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NoDefaultValue {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn cannot_generate_id(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::CannotGenerateId {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn unsupported_platform(platform: impl ToString, feature: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            platform: platform.to_string(),
            feature: feature.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for BulkError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for BulkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
