//! The per-table transform and load-time stamp.
//!
//! `new_column = existing_column * 2`. Values are parsed as numbers: if every
//! non-null value is an integer the result is an integer column, otherwise a
//! float column. Values that are not numeric become null.

use chrono::{DateTime, Utc};
use tracing::debug;

use unload_core::{ColumnType, Table, Value, LOAD_TIMESTAMP_COLUMN};

use crate::error::PipelineError;

pub const SOURCE_COLUMN: &str = "existing_column";
pub const DERIVED_COLUMN: &str = "new_column";

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Integer(v) => Some(Number::Int(*v)),
        Value::Float(v) => Some(Number::Float(*v)),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Number::Int)
                .or_else(|_| s.parse::<f64>().map(Number::Float))
                .ok()
        }
        _ => None,
    }
}

/// Assign `new_column` from `existing_column`, overwriting any previous
/// `new_column`.
pub fn apply(table: &mut Table) -> Result<(), PipelineError> {
    let source = table.column_values(SOURCE_COLUMN).ok_or_else(|| {
        PipelineError::Transform(format!("column {SOURCE_COLUMN} not found"))
    })?;

    let numbers: Vec<Option<Number>> = source.into_iter().map(as_number).collect();
    let doubled_ints: Option<Vec<Value>> = numbers
        .iter()
        .map(|n| match n {
            None => Some(Value::Null),
            Some(Number::Int(v)) => v.checked_mul(2).map(Value::Integer),
            Some(Number::Float(_)) => None,
        })
        .collect();

    let (column_type, values) = match doubled_ints {
        Some(values) => (ColumnType::Integer, values),
        None => (
            ColumnType::Float,
            numbers
                .iter()
                .map(|n| match n {
                    None => Value::Null,
                    Some(Number::Int(v)) => Value::Float(*v as f64 * 2.0),
                    Some(Number::Float(v)) => Value::Float(v * 2.0),
                })
                .collect(),
        ),
    };

    debug!(rows = values.len(), ?column_type, "derived {DERIVED_COLUMN}");
    table
        .set_column(DERIVED_COLUMN, column_type, values)
        .map_err(|e| PipelineError::Transform(e.to_string()))
}

/// Set `loaddts` to `now` on every row, replacing any existing column.
pub fn stamp_load_time(table: &mut Table, now: DateTime<Utc>) -> Result<(), PipelineError> {
    table
        .fill_column(LOAD_TIMESTAMP_COLUMN, ColumnType::Timestamp, Value::Timestamp(now))
        .map_err(|e| PipelineError::Transform(e.to_string()))
}
