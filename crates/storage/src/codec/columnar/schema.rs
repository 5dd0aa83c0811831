//! Column type ⇄ Arrow type mapping.

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use unload_core::{Column, ColumnType};

pub(crate) const UTC: &str = "UTC";

pub(crate) fn column_type_to_arrow(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Text => DataType::Utf8,
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
    }
}

/// Map an Arrow type found in a file back to a column type.
///
/// Narrower Arrow types are widened (`Int32` → integer, `Float32` → float,
/// any timestamp unit → timestamp). Anything else is unsupported.
pub(crate) fn arrow_to_column_type(data_type: &DataType) -> Option<ColumnType> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Some(ColumnType::Text),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => Some(ColumnType::Integer),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(ColumnType::Float),
        DataType::Boolean => Some(ColumnType::Boolean),
        DataType::Timestamp(_, _) => Some(ColumnType::Timestamp),
        _ => None,
    }
}

/// Build an Arrow [`Schema`] from table columns. Every field is nullable.
pub(crate) fn build_schema(columns: &[Column]) -> Schema {
    let fields: Vec<Field> = columns
        .iter()
        .map(|col| Field::new(&col.name, column_type_to_arrow(col.column_type), true))
        .collect();
    Schema::new(fields)
}
