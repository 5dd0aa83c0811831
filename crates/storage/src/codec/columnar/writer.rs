use std::sync::Arc;

use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use unload_core::Table;

use super::builders::build_arrays;
use super::schema::build_schema;
use crate::error::StorageError;

/// Convert a [`Table`] into an Arrow [`RecordBatch`].
fn table_to_record_batch(table: &Table) -> Result<RecordBatch, StorageError> {
    let schema = Arc::new(build_schema(table.columns()));
    let arrays = build_arrays(table.rows(), &schema);
    // Explicit row count keeps zero-column tables representable.
    let options = RecordBatchOptions::new().with_row_count(Some(table.row_count()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

/// Write a table to an in-memory Parquet file (Zstd compressed).
pub(crate) fn encode(table: &Table) -> Result<Vec<u8>, StorageError> {
    let batch = table_to_record_batch(table)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    debug!(
        rows = batch.num_rows(),
        bytes = buf.len(),
        "Encoded Parquet payload"
    );

    Ok(buf)
}
