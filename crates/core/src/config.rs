use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::format::FileFormat;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn default_concurrency() -> usize {
    1
}

fn default_query_dir() -> PathBuf {
    PathBuf::from("Query")
}

/// Job definition for one pipeline run.
///
/// Loaded once from YAML and read-only afterwards. Only the six required keys
/// are mandatory; the rest fall back to defaults or to the Athena env config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// ARN of the cross-account role to assume.
    pub aws_role: String,
    /// Ordered query identifiers; index `i` produces `processed_data_{i}`.
    #[serde(alias = "query_identifiers")]
    pub query_files: Vec<String>,
    /// Athena database the queries run against.
    pub source_database: String,
    /// S3 URI for Athena query results.
    pub athena_output_location: String,
    /// Bucket receiving the processed artifacts.
    pub destination_bucket: String,
    /// Raw format tag; checked by [`PipelineConfig::validate`].
    pub file_format: String,

    /// AWS region override.
    #[serde(default)]
    pub region: Option<String>,
    /// Athena workgroup override.
    #[serde(default)]
    pub workgroup: Option<String>,
    /// Number of query items processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound on waiting for one query to finish.
    #[serde(default)]
    pub max_wait_seconds: Option<u64>,
    /// Directory holding the query files.
    #[serde(default = "default_query_dir")]
    pub query_dir: PathBuf,
    /// Optional key prefix inside the destination bucket.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl PipelineConfig {
    /// Read and parse a YAML config file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CoreError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Check the config and resolve the format tag.
    ///
    /// The format is checked first: an unsupported tag affects every query
    /// item, so it must stop the run before anything is submitted.
    pub fn validate(&self) -> Result<FileFormat, CoreError> {
        let format: FileFormat = self.file_format.parse()?;

        let required = [
            ("aws_role", &self.aws_role),
            ("source_database", &self.source_database),
            ("athena_output_location", &self.athena_output_location),
            ("destination_bucket", &self.destination_bucket),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(CoreError::InvalidConfig(format!("{key} must not be empty")));
            }
        }

        if !self.athena_output_location.starts_with("s3://") {
            return Err(CoreError::InvalidConfig(format!(
                "athena_output_location must be an s3:// URI, got {:?}",
                self.athena_output_location
            )));
        }
        if self.query_files.is_empty() {
            return Err(CoreError::InvalidConfig(
                "query_files must list at least one query".into(),
            ));
        }
        if self.query_files.iter().any(|q| q.trim().is_empty()) {
            return Err(CoreError::InvalidConfig(
                "query_files must not contain empty identifiers".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(CoreError::InvalidConfig("concurrency must be at least 1".into()));
        }

        Ok(format)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Pipeline config loaded:");
        tracing::info!("  role:        {}", self.aws_role);
        tracing::info!("  database:    {}", self.source_database);
        tracing::info!("  queries:     {}", self.query_files.len());
        tracing::info!("  destination: s3://{} ({})", self.destination_bucket, self.file_format);
        tracing::info!("  concurrency: {}", self.concurrency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
aws_role: arn:aws:iam::123456789012:role/reporting
query_files:
  - daily_orders.sql
  - refunds.sql
source_database: analytics
athena_output_location: s3://athena-results/tmp/
destination_bucket: processed-bucket
file_format: csv
"#;

    #[test]
    fn parses_required_keys_with_defaults() {
        let cfg = PipelineConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(cfg.query_files, vec!["daily_orders.sql", "refunds.sql"]);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.query_dir, PathBuf::from("Query"));
        assert!(cfg.region.is_none());
        assert!(cfg.max_wait_seconds.is_none());
        assert_eq!(cfg.validate().unwrap(), FileFormat::Csv);
    }

    #[test]
    fn query_identifiers_alias() {
        let yaml = SAMPLE.replace("query_files:", "query_identifiers:");
        let cfg = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg.query_files.len(), 2);
    }

    #[test]
    fn unsupported_format_fails_validation() {
        let yaml = SAMPLE.replace("file_format: csv", "file_format: xlsx");
        let cfg = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert!(matches!(cfg.validate(), Err(CoreError::UnsupportedFormat(_))));
    }

    #[test]
    fn format_is_checked_before_other_fields() {
        let yaml = SAMPLE
            .replace("file_format: csv", "file_format: avro")
            .replace("destination_bucket: processed-bucket", "destination_bucket: ''");
        let cfg = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert!(matches!(cfg.validate(), Err(CoreError::UnsupportedFormat(_))));
    }

    #[test]
    fn rejects_bad_fields() {
        let cfg = PipelineConfig::from_yaml_str(
            &SAMPLE.replace("s3://athena-results/tmp/", "/tmp/results"),
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));

        let mut cfg = PipelineConfig::from_yaml_str(SAMPLE).unwrap();
        cfg.concurrency = 0;
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));

        let mut cfg = PipelineConfig::from_yaml_str(SAMPLE).unwrap();
        cfg.query_files.clear();
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn missing_required_key_is_parse_error() {
        let yaml = SAMPLE.replace("source_database: analytics\n", "");
        assert!(matches!(
            PipelineConfig::from_yaml_str(&yaml),
            Err(CoreError::ConfigParse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(cfg.destination_bucket, "processed-bucket");

        let missing = PipelineConfig::load("/definitely/not/here.yaml");
        assert!(matches!(missing, Err(CoreError::Io(_))));
    }
}
