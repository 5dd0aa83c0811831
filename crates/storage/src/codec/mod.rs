//! Table ⇄ bytes, dispatched on [`FileFormat`].
//!
//! | format    | layout                              | timestamps            |
//! |-----------|-------------------------------------|-----------------------|
//! | `csv`     | header + RFC 4180 lines, all text   | RFC 3339, millisecond |
//! | `json`    | array of row objects                | RFC 3339, millisecond |
//! | `parquet` | Arrow schema + Zstd column chunks   | µs since epoch, UTC   |
//!
//! `decode(encode(t, f), f)` equals [`FormatCodec::normalize`]`(t, f)` for
//! every table `encode` accepts. `json` refuses non-finite floats and
//! repeated column names with [`StorageError::Encode`].

mod columnar;
mod records;
mod text;

use chrono::{DateTime, NaiveDateTime, Utc};

use unload_core::{ColumnType, FileFormat, Table, Value, LOAD_TIMESTAMP_COLUMN};

use crate::error::StorageError;

pub struct FormatCodec;

impl FormatCodec {
    pub fn encode(table: &Table, format: FileFormat) -> Result<Vec<u8>, StorageError> {
        match format {
            FileFormat::Csv => text::encode(table),
            FileFormat::Parquet => columnar::encode(table),
            FileFormat::Json => records::encode(table),
        }
    }

    pub fn decode(bytes: &[u8], format: FileFormat) -> Result<Table, StorageError> {
        match format {
            FileFormat::Csv => text::decode(bytes),
            FileFormat::Parquet => columnar::decode(bytes),
            FileFormat::Json => records::decode(bytes),
        }
    }

    /// The table a round trip through `format` yields.
    ///
    /// - every format truncates timestamps to
    ///   [`FileFormat::timestamp_precision`];
    /// - `csv` renders all columns except `loaddts` as text, and empty text
    ///   as null;
    /// - `json` renders timestamp columns other than `loaddts` as text, and
    ///   all-null columns come back text typed.
    pub fn normalize(table: &Table, format: FileFormat) -> Table {
        let precision = format.timestamp_precision();
        let truncate = |v: &Value| match v {
            Value::Timestamp(ts) => Value::Timestamp(precision.truncate(*ts)),
            other => other.clone(),
        };
        let as_text = |v: &Value| match v.to_text() {
            Some(s) if format == FileFormat::Csv && s.is_empty() => Value::Null,
            Some(s) => Value::Text(s),
            None => Value::Null,
        };

        let mut out = table.clone();
        for column in table.columns() {
            let name = column.name.as_str();
            let values = table.column_values(name).unwrap_or_default();
            let all_null = values.iter().all(|v| v.is_null());

            let (column_type, values): (ColumnType, Vec<Value>) =
                match (format, name == LOAD_TIMESTAMP_COLUMN) {
                    (FileFormat::Parquet, _) => {
                        (column.column_type, values.into_iter().map(truncate).collect())
                    }
                    (_, true) => (
                        ColumnType::Timestamp,
                        values.into_iter().map(truncate).collect(),
                    ),
                    (FileFormat::Json, false)
                        if column.column_type != ColumnType::Timestamp && !all_null =>
                    {
                        (column.column_type, values.into_iter().cloned().collect())
                    }
                    (FileFormat::Csv | FileFormat::Json, false) => (
                        ColumnType::Text,
                        values.into_iter().map(as_text).collect::<Vec<_>>(),
                    ),
                };

            // Same name and length as the source column, cannot fail.
            let _ = out.set_column(name, column_type, values);
        }

        out
    }
}

/// Parse a timestamp string as written by the text codecs.
///
/// Supports:
/// 1. RFC 3339: `2025-06-14T10:30:00.123Z`
/// 2. Space-separated: `2025-06-14 10:30:00[.fff]` (taken as UTC)
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    None
}
