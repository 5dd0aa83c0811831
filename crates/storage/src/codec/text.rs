//! `csv`: header row plus one line per row.
//!
//! Quoting follows RFC 4180 via the `csv` crate, so values containing commas,
//! quotes or newlines survive a round trip. Nulls are written as empty
//! fields. The file carries no types: decoding yields text columns, except
//! `loaddts` which is parsed back into a timestamp.

use unload_core::{Column, ColumnType, FileFormat, Table, Value, LOAD_TIMESTAMP_COLUMN};

use super::parse_timestamp;
use crate::error::StorageError;

pub(super) fn encode(table: &Table) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(table.columns().iter().map(|c| c.name.as_str()))?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| v.to_text().unwrap_or_default()))?;
    }

    writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))
}

pub(super) fn decode(bytes: &[u8]) -> Result<Table, StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let columns: Vec<Column> = reader
        .headers()?
        .iter()
        .map(|name| {
            if name == LOAD_TIMESTAMP_COLUMN {
                Column::new(name, ColumnType::Timestamp)
            } else {
                Column::text(name)
            }
        })
        .collect();

    let mut table = Table::new(columns.clone());
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .zip(&columns)
            .map(|(field, column)| decode_field(field, column))
            .collect::<Result<Vec<_>, _>>()?;
        table
            .push_row(row)
            .map_err(|e| StorageError::decode(FileFormat::Csv, e.to_string()))?;
    }

    Ok(table)
}

fn decode_field(field: &str, column: &Column) -> Result<Value, StorageError> {
    if field.is_empty() {
        return Ok(Value::Null);
    }
    match column.column_type {
        ColumnType::Timestamp => parse_timestamp(field).map(Value::Timestamp).ok_or_else(|| {
            StorageError::decode(
                FileFormat::Csv,
                format!("column {} holds invalid timestamp {:?}", column.name, field),
            )
        }),
        _ => Ok(Value::Text(field.to_string())),
    }
}
