//! Build typed Arrow arrays from table rows.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Schema, TimeUnit};

use unload_core::Value;

use super::schema::UTC;

/// Build one array per schema field from row-major values.
///
/// Values that do not fit the column type become NULL (type downgrade, no
/// panic), except in text columns where any value is stored as its text.
pub(crate) fn build_arrays(rows: &[Vec<Value>], schema: &Schema) -> Vec<ArrayRef> {
    let num_rows = rows.len();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (col_idx, field) in schema.fields().iter().enumerate() {
        let cells = rows.iter().map(|row| &row[col_idx]);

        let array: ArrayRef = match field.data_type() {
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(num_rows);
                for cell in cells {
                    match cell {
                        Value::Integer(v) => builder.append_value(*v),
                        Value::Text(s) => builder.append_option(s.parse::<i64>().ok()),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Float64 => {
                let mut builder = Float64Builder::with_capacity(num_rows);
                for cell in cells {
                    match cell {
                        Value::Float(v) => builder.append_value(*v),
                        Value::Integer(v) => builder.append_value(*v as f64),
                        Value::Text(s) => builder.append_option(s.parse::<f64>().ok()),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(num_rows);
                for cell in cells {
                    match cell {
                        Value::Boolean(v) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                let mut builder = TimestampMicrosecondBuilder::with_capacity(num_rows);
                for cell in cells {
                    match cell {
                        Value::Timestamp(ts) => builder.append_value(ts.timestamp_micros()),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish().with_timezone(UTC))
            }
            // Default: UTF-8 string
            _ => {
                let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 32);
                for cell in cells {
                    match cell.to_text() {
                        Some(s) => builder.append_value(s),
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
        };

        arrays.push(array);
    }

    arrays
}
