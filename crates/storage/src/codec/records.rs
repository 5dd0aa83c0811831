//! `json`: one array of row objects, keys in column order.
//!
//! Integers, floats, booleans, strings and nulls map to their JSON natives.
//! Timestamps are written as RFC 3339 strings with millisecond precision;
//! on decode only `loaddts` is turned back into a timestamp. Column types are
//! inferred from the values: all integers → integer, any other number mix →
//! float, all booleans → boolean, otherwise text. A column that is null in
//! every row decodes as text.
//!
//! Tables that an object per row cannot hold are rejected on encode: NaN
//! and infinite floats have no JSON number, and a repeated column name would
//! collapse into a single key.

use chrono::SecondsFormat;
use serde_json::{Map, Number};

use unload_core::{Column, ColumnType, FileFormat, Table, Value, LOAD_TIMESTAMP_COLUMN};

use super::parse_timestamp;
use crate::error::StorageError;

type JsonValue = serde_json::Value;

pub(super) fn encode(table: &Table) -> Result<Vec<u8>, StorageError> {
    let columns = table.columns();
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.name == column.name) {
            return Err(StorageError::encode(
                FileFormat::Json,
                format!("duplicate column name {:?}", column.name),
            ));
        }
    }

    let records = table
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(column, value)| Ok((column.name.clone(), to_json(&column.name, value)?)))
                .collect::<Result<Map<String, JsonValue>, StorageError>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(serde_json::to_vec(&records)?)
}

fn to_json(name: &str, value: &Value) -> Result<JsonValue, StorageError> {
    let json = match value {
        Value::Null => JsonValue::Null,
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Integer(v) => JsonValue::Number((*v).into()),
        Value::Float(v) => JsonValue::Number(Number::from_f64(*v).ok_or_else(|| {
            StorageError::encode(
                FileFormat::Json,
                format!("column {name} holds non-finite float {v}"),
            )
        })?),
        Value::Boolean(v) => JsonValue::Bool(*v),
        Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
    };
    Ok(json)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Table, StorageError> {
    let records: Vec<Map<String, JsonValue>> = serde_json::from_slice(bytes)?;

    // Column order: first appearance across all records.
    let mut names: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }

    let mut columns = Vec::with_capacity(names.len());
    let mut cells: Vec<Vec<Value>> = vec![Vec::with_capacity(names.len()); records.len()];

    for name in &names {
        let raw: Vec<&JsonValue> = records
            .iter()
            .map(|r| r.get(name).unwrap_or(&JsonValue::Null))
            .collect();
        let column_type = infer_type(name, &raw);

        for (row, json) in cells.iter_mut().zip(&raw) {
            row.push(from_json(name, column_type, json)?);
        }
        columns.push(Column::new(name.clone(), column_type));
    }

    Table::from_parts(columns, cells)
        .map_err(|e| StorageError::decode(FileFormat::Json, e.to_string()))
}

fn infer_type(name: &str, values: &[&JsonValue]) -> ColumnType {
    if name == LOAD_TIMESTAMP_COLUMN {
        return ColumnType::Timestamp;
    }

    let present: Vec<&JsonValue> = values.iter().copied().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        ColumnType::Text
    } else if present.iter().all(|v| v.is_i64()) {
        ColumnType::Integer
    } else if present.iter().all(|v| v.is_number()) {
        ColumnType::Float
    } else if present.iter().all(|v| v.is_boolean()) {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

fn from_json(name: &str, column_type: ColumnType, json: &JsonValue) -> Result<Value, StorageError> {
    let value = match (column_type, json) {
        (_, JsonValue::Null) => Value::Null,
        (ColumnType::Integer, JsonValue::Number(n)) => n.as_i64().map_or(Value::Null, Value::Integer),
        (ColumnType::Float, JsonValue::Number(n)) => n.as_f64().map_or(Value::Null, Value::Float),
        (ColumnType::Boolean, JsonValue::Bool(b)) => Value::Boolean(*b),
        (ColumnType::Timestamp, JsonValue::String(s)) => {
            Value::Timestamp(parse_timestamp(s).ok_or_else(|| {
                StorageError::decode(
                    FileFormat::Json,
                    format!("column {name} holds invalid timestamp {s:?}"),
                )
            })?)
        }
        (ColumnType::Timestamp, other) => {
            return Err(StorageError::decode(
                FileFormat::Json,
                format!("column {name} holds non-string timestamp {other}"),
            ))
        }
        (_, JsonValue::String(s)) => Value::Text(s.clone()),
        // Mixed column: keep the JSON text of non-string values.
        (_, other) => Value::Text(other.to_string()),
    };
    Ok(value)
}
