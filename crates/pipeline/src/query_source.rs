//! Query identifier → SQL text.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PipelineError;

#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<String, PipelineError>;
}

/// Reads `<dir>/<id>` as UTF-8 text.
#[derive(Debug, Clone)]
pub struct DirectoryQuerySource {
    dir: PathBuf,
}

impl DirectoryQuerySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl QuerySource for DirectoryQuerySource {
    async fn resolve(&self, id: &str) -> Result<String, PipelineError> {
        let path = self.dir.join(id);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::QuerySource {
                id: id.to_string(),
                message: format!("{}: {e}", path.display()),
            })?;
        non_empty(id, text)
    }
}

/// Fixed id → SQL map.
#[derive(Debug, Clone, Default)]
pub struct StaticQuerySource {
    queries: HashMap<String, String>,
}

impl StaticQuerySource {
    pub fn new<I, K, V>(queries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            queries: queries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl QuerySource for StaticQuerySource {
    async fn resolve(&self, id: &str) -> Result<String, PipelineError> {
        let text = self
            .queries
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::QuerySource {
                id: id.to_string(),
                message: "unknown query identifier".into(),
            })?;
        non_empty(id, text)
    }
}

fn non_empty(id: &str, text: String) -> Result<String, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::QuerySource {
            id: id.to_string(),
            message: "query text is empty".into(),
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("orders.sql"), "SELECT * FROM orders").unwrap();
        std::fs::write(dir.path().join("blank.sql"), "  \n").unwrap();

        let source = DirectoryQuerySource::new(dir.path());
        assert_eq!(source.resolve("orders.sql").await.unwrap(), "SELECT * FROM orders");
        assert!(matches!(
            source.resolve("blank.sql").await,
            Err(PipelineError::QuerySource { .. })
        ));

        let err = source.resolve("missing.sql").await.unwrap_err();
        assert!(err.to_string().contains("missing.sql"));
    }

    #[tokio::test]
    async fn static_source_lookup() {
        let source = StaticQuerySource::new([("a", "SELECT 1")]);
        assert_eq!(source.resolve("a").await.unwrap(), "SELECT 1");
        assert!(source.resolve("b").await.is_err());
    }
}
