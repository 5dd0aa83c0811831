//! Table codecs and object-store access for unload artifacts.

pub mod codec;
pub mod error;
pub mod gateway;
pub mod retry;

pub use codec::FormatCodec;
pub use error::StorageError;
pub use gateway::ObjectStoreGateway;
pub use retry::{retry_transient, RetryPolicy};
