pub mod cancel;
pub mod config;
pub mod error;
pub mod format;
pub mod session;
pub mod table;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::PipelineConfig;
pub use error::CoreError;
pub use format::{FileFormat, TimestampPrecision};
pub use session::Session;
pub use table::{Column, ColumnType, Table, Value, LOAD_TIMESTAMP_COLUMN};
