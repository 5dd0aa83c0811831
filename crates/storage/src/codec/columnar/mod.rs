//! `parquet`: typed columnar files.
//!
//! The Arrow schema travels in the Parquet footer, so decoding recovers the
//! exact column types without hints. Timestamps are stored as
//! `Timestamp(Microsecond, "UTC")`; sub-microsecond digits are dropped.

mod builders;
mod reader;
mod schema;
mod writer;

pub(super) use reader::decode;
pub(super) use writer::encode;
