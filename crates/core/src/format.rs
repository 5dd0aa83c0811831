//! Output serialization formats.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Serialization strategy for an artifact.
///
/// The set is closed: any other tag is rejected with
/// [`CoreError::UnsupportedFormat`] when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Header row plus one comma-separated line per row.
    Csv,
    /// Typed, self-describing columnar file.
    Parquet,
    /// JSON array of row objects.
    Json,
}

/// Sub-second precision a format keeps for timestamp values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    Millisecond,
    Microsecond,
}

impl TimestampPrecision {
    /// Number of fractional second digits kept.
    pub fn digits(self) -> u16 {
        match self {
            TimestampPrecision::Millisecond => 3,
            TimestampPrecision::Microsecond => 6,
        }
    }

    /// Drop the sub-second digits the format cannot represent.
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.trunc_subsecs(self.digits())
    }
}

impl FileFormat {
    pub const ALL: [FileFormat; 3] = [FileFormat::Csv, FileFormat::Parquet, FileFormat::Json];

    /// File extension used for artifact keys.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Json => "json",
        }
    }

    /// Timestamp precision preserved by an encode/decode round trip.
    ///
    /// Text formats write RFC 3339 strings with milliseconds; Parquet stores
    /// `Timestamp(Microsecond, UTC)`.
    pub fn timestamp_precision(self) -> TimestampPrecision {
        match self {
            FileFormat::Csv | FileFormat::Json => TimestampPrecision::Millisecond,
            FileFormat::Parquet => TimestampPrecision::Microsecond,
        }
    }

    /// Guess the format from an object key's extension.
    pub fn from_key(key: &str) -> Option<Self> {
        let (_, ext) = key.rsplit_once('.')?;
        ext.parse().ok()
    }
}

impl FromStr for FileFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "parquet" => Ok(FileFormat::Parquet),
            "json" => Ok(FileFormat::Json),
            _ => Err(CoreError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_known_tags() {
        assert_eq!("csv".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert_eq!("PARQUET".parse::<FileFormat>().unwrap(), FileFormat::Parquet);
        assert_eq!(" json ".parse::<FileFormat>().unwrap(), FileFormat::Json);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "xlsx".parse::<FileFormat>().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFormat(ref tag) if tag == "xlsx"));
        assert!(err.to_string().contains("xlsx"));
    }

    #[test]
    fn extension_matches_tag() {
        for format in FileFormat::ALL {
            assert_eq!(format.extension().parse::<FileFormat>().unwrap(), format);
            assert_eq!(format.to_string(), format.extension());
        }
    }

    #[test]
    fn format_from_key() {
        assert_eq!(FileFormat::from_key("processed_data_0.csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_key("out/processed_data_3.parquet"), Some(FileFormat::Parquet));
        assert_eq!(FileFormat::from_key("processed_data_0"), None);
        assert_eq!(FileFormat::from_key("report.xlsx"), None);
    }

    #[test]
    fn precision_truncates() {
        let ts = Utc.timestamp_opt(1_750_000_000, 123_456_789).unwrap();
        let ms = TimestampPrecision::Millisecond.truncate(ts);
        let us = TimestampPrecision::Microsecond.truncate(ts);
        assert_eq!(ms.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(us.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(FileFormat::Csv.timestamp_precision(), TimestampPrecision::Millisecond);
        assert_eq!(FileFormat::Json.timestamp_precision(), TimestampPrecision::Millisecond);
        assert_eq!(FileFormat::Parquet.timestamp_precision(), TimestampPrecision::Microsecond);
    }
}
