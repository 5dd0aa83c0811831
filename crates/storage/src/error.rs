use thiserror::Error;

use unload_core::FileFormat;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The session may not touch this object. Fatal for the run.
    #[error("access denied for {key}: {message}")]
    AccessDenied { key: String, message: String },

    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Network or server-side failure, still failing after `attempts` tries.
    #[error("transient store error for {key} after {attempts} attempt(s): {message}")]
    Transient {
        key: String,
        attempts: u32,
        message: String,
    },

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The payload is well-formed for its format but not a valid table.
    #[error("cannot decode {format} payload: {message}")]
    Decode { format: FileFormat, message: String },

    /// The table has no faithful representation in the format.
    #[error("cannot encode table as {format}: {message}")]
    Encode { format: FileFormat, message: String },

    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient { .. })
    }

    /// Errors that make every further write pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::AccessDenied { .. })
    }

    pub(crate) fn encode(format: FileFormat, message: impl Into<String>) -> Self {
        StorageError::Encode {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn decode(format: FileFormat, message: impl Into<String>) -> Self {
        StorageError::Decode {
            format,
            message: message.into(),
        }
    }
}
