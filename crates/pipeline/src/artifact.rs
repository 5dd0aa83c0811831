use std::fmt;

use unload_core::FileFormat;

/// Where one query item's output lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub bucket: String,
    pub key: String,
    pub format: FileFormat,
}

impl ArtifactKey {
    /// `[prefix/]processed_data_{index}.{ext}`. Indices are unique per run,
    /// so keys are too.
    pub fn for_item(bucket: &str, prefix: Option<&str>, index: usize, format: FileFormat) -> Self {
        let file_name = format!("processed_data_{index}.{}", format.extension());
        let key = match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix}/{file_name}"),
            None => file_name,
        };
        Self {
            bucket: bucket.to_string(),
            key,
            format,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
