use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{Float64Type, Int64Type, TimestampMicrosecondType};
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use unload_core::{Column, ColumnType, FileFormat, Table, Value};

use super::schema::{arrow_to_column_type, column_type_to_arrow};
use crate::error::StorageError;

/// Read a Parquet payload back into a [`Table`], schema from the footer.
pub(crate) fn decode(bytes: &[u8]) -> Result<Table, StorageError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;

    let columns = builder
        .schema()
        .fields()
        .iter()
        .map(|field| {
            arrow_to_column_type(field.data_type())
                .map(|ty| Column::new(field.name().clone(), ty))
                .ok_or_else(|| {
                    StorageError::decode(
                        FileFormat::Parquet,
                        format!("column {} has unsupported type {}", field.name(), field.data_type()),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let reader = builder.build()?;
    let mut table = Table::new(columns.clone());

    for batch in reader {
        let batch = batch?;
        let mut column_values: Vec<Vec<Value>> = Vec::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            let array = cast(batch.column(idx), &column_type_to_arrow(column.column_type))?;
            column_values.push(array_values(array.as_ref(), column.column_type)?);
        }

        for row in 0..batch.num_rows() {
            let values = column_values.iter().map(|col| col[row].clone()).collect();
            table
                .push_row(values)
                .map_err(|e| StorageError::decode(FileFormat::Parquet, e.to_string()))?;
        }
    }

    Ok(table)
}

fn array_values(array: &dyn Array, column_type: ColumnType) -> Result<Vec<Value>, StorageError> {
    let values = (0..array.len()).map(|i| -> Result<Value, StorageError> {
        if array.is_null(i) {
            return Ok(Value::Null);
        }
        let value = match column_type {
            ColumnType::Text => Value::Text(array.as_string::<i32>().value(i).to_string()),
            ColumnType::Integer => Value::Integer(array.as_primitive::<Int64Type>().value(i)),
            ColumnType::Float => Value::Float(array.as_primitive::<Float64Type>().value(i)),
            ColumnType::Boolean => Value::Boolean(array.as_boolean().value(i)),
            ColumnType::Timestamp => {
                let micros = array.as_primitive::<TimestampMicrosecondType>().value(i);
                let ts = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                    StorageError::decode(
                        FileFormat::Parquet,
                        format!("timestamp {micros}µs is out of range"),
                    )
                })?;
                Value::Timestamp(ts)
            }
        };
        Ok(value)
    });
    values.collect()
}
