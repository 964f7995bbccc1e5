use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid entity model: {0}")]
    InvalidModel(String),

    #[error("Column '{0}' not found in entity '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, MappingError>;

impl MappingError {
    /// Error raised by every read-style call on a write-only proxy.
    pub fn unread(call: &str) -> Self {
        Self::UnsupportedOperation(format!(
            "{}() is not available without reading current state",
            call
        ))
    }
}

impl<T> From<std::sync::PoisonError<T>> for MappingError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for MappingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for MappingError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for MappingError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
