use thiserror::Error;

use unload_athena::AthenaError;
use unload_core::CoreError;
use unload_storage::StorageError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid config or unsupported format tag.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Athena(#[from] AthenaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("query {id} could not be loaded: {message}")]
    QuerySource { id: String, message: String },

    #[error("transform failed: {0}")]
    Transform(String),

    /// The run was cancelled before this item started.
    #[error("cancelled")]
    Cancelled,

    /// An earlier fatal error stopped the run before this item started.
    #[error("run aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Errors that stop the whole run rather than one item.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Core(_) => true,
            PipelineError::Athena(AthenaError::Authorization(_)) => true,
            PipelineError::Storage(e) => e.is_fatal(),
            _ => false,
        }
    }
}
