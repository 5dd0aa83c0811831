//! Drives every configured query item through the pipeline stages.
//!
//! Per item: `pending → submitted → awaiting_result → materializing →
//! transforming → encoding → storing → done`. A failure records the stage it
//! happened in and never stops other items, except for fatal errors (denied
//! storage access), after which items that have not started are reported as
//! aborted.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use unload_athena::{AthenaConfig, TableMaterializer};
use unload_core::{CancelSignal, FileFormat, PipelineConfig};
use unload_storage::FormatCodec;

use crate::artifact::ArtifactKey;
use crate::error::PipelineError;
use crate::query_source::QuerySource;
use crate::services::RunServices;
use crate::transform;

// ---------------------------------------------------------------------------
// Item state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Submitted,
    AwaitingResult,
    Materializing,
    Transforming,
    Encoding,
    Storing,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Submitted => "submitted",
            Stage::AwaitingResult => "awaiting_result",
            Stage::Materializing => "materializing",
            Stage::Transforming => "transforming",
            Stage::Encoding => "encoding",
            Stage::Storing => "storing",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Done { key: ArtifactKey, rows: usize },
    /// The query returned a header and no rows; nothing was written.
    SkippedEmpty,
    Failed { stage: Stage, error: PipelineError },
}

#[derive(Debug)]
pub struct ItemReport {
    pub index: usize,
    pub query_id: String,
    /// Athena execution id, once submitted.
    pub job_id: Option<String>,
    pub outcome: ItemOutcome,
}

/// One query item as planned from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub index: usize,
    pub query_id: String,
    pub key: ArtifactKey,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Per-item outcomes, ordered by configuration index.
#[derive(Debug, Default)]
pub struct RunSummary {
    items: Vec<ItemReport>,
    aborted: Option<String>,
    elapsed: Duration,
}

impl RunSummary {
    pub fn items(&self) -> &[ItemReport] {
        &self.items
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Done { .. }))
    }

    pub fn skipped_empty(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::SkippedEmpty))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed { .. }))
    }

    /// The fatal error that stopped the run early, if any.
    pub fn aborted(&self) -> Option<&str> {
        self.aborted.as_deref()
    }

    /// No failed items and no abort.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.aborted.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} succeeded, {} skipped (empty), {} failed in {:.1}s",
            self.succeeded(),
            self.skipped_empty(),
            self.failed(),
            self.elapsed.as_secs_f64()
        )?;
        for report in &self.items {
            write!(f, "  [{}] {}: ", report.index, report.query_id)?;
            match &report.outcome {
                ItemOutcome::Done { key, rows } => writeln!(f, "{rows} rows -> {key}")?,
                ItemOutcome::SkippedEmpty => writeln!(f, "no rows, skipped")?,
                ItemOutcome::Failed { stage, error } => writeln!(f, "failed at {stage}: {error}")?,
            }
        }
        if let Some(reason) = &self.aborted {
            writeln!(f, "run aborted: {reason}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, (Stage, PipelineError)>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, (Stage, PipelineError)> {
        self.map_err(|e| (stage, e.into()))
    }
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    format: FileFormat,
    source: Arc<dyn QuerySource>,
}

impl PipelineOrchestrator {
    /// Validate `config`. An unsupported format or invalid config is
    /// rejected here, before any query is submitted.
    pub fn new(config: PipelineConfig, source: Arc<dyn QuerySource>) -> Result<Self, PipelineError> {
        let format = config.validate()?;
        Ok(Self {
            config,
            format,
            source,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// `base` with the region, workgroup and max wait from the config applied.
    pub fn athena_config(&self, base: AthenaConfig) -> AthenaConfig {
        base.with_overrides(
            self.config.region.as_deref(),
            self.config.workgroup.as_deref(),
            self.config.max_wait_seconds,
        )
    }

    /// Items in configuration order with their output keys.
    pub fn plan(&self) -> Vec<PlannedItem> {
        self.config
            .query_files
            .iter()
            .enumerate()
            .map(|(index, query_id)| PlannedItem {
                index,
                query_id: query_id.clone(),
                key: ArtifactKey::for_item(
                    &self.config.destination_bucket,
                    self.config.key_prefix.as_deref(),
                    index,
                    self.format,
                ),
            })
            .collect()
    }

    /// Resolve every query text without touching AWS.
    pub async fn dry_run(&self) -> Result<Vec<PlannedItem>, PipelineError> {
        let plan = self.plan();
        for item in &plan {
            let sql = self.source.resolve(&item.query_id).await?;
            info!(
                index = item.index,
                query_id = %item.query_id,
                sql_bytes = sql.len(),
                key = %item.key,
                "planned"
            );
        }
        Ok(plan)
    }

    pub async fn run(&self, services: &RunServices, cancel: &CancelSignal) -> RunSummary {
        let started = Instant::now();
        let plan = self.plan();
        let concurrency = self.config.concurrency.max(1);

        info!(
            queries = plan.len(),
            database = %self.config.source_database,
            bucket = %self.config.destination_bucket,
            format = %self.format,
            concurrency,
            "pipeline run started"
        );

        let abort = OnceLock::new();
        let mut items: Vec<ItemReport> = stream::iter(plan)
            .map(|item| self.run_item(item, services, cancel, &abort))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        items.sort_by_key(|r| r.index);

        let summary = RunSummary {
            items,
            aborted: abort.into_inner(),
            elapsed: started.elapsed(),
        };

        info!(
            succeeded = summary.succeeded(),
            skipped_empty = summary.skipped_empty(),
            failed = summary.failed(),
            aborted = summary.aborted.is_some(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline run finished"
        );
        summary
    }

    async fn run_item(
        &self,
        item: PlannedItem,
        services: &RunServices,
        cancel: &CancelSignal,
        abort: &OnceLock<String>,
    ) -> ItemReport {
        let mut job_id = None;
        let outcome = match self.process(&item, services, cancel, abort, &mut job_id).await {
            Ok(outcome) => outcome,
            Err((stage, err)) => {
                if err.is_fatal() && abort.set(err.to_string()).is_ok() {
                    error!(
                        index = item.index,
                        query_id = %item.query_id,
                        "fatal error, remaining items will not start: {err}"
                    );
                }
                warn!(
                    index = item.index,
                    query_id = %item.query_id,
                    stage = %stage,
                    "query item failed: {err}"
                );
                ItemOutcome::Failed { stage, error: err }
            }
        };

        ItemReport {
            index: item.index,
            query_id: item.query_id,
            job_id,
            outcome,
        }
    }

    async fn process(
        &self,
        item: &PlannedItem,
        services: &RunServices,
        cancel: &CancelSignal,
        abort: &OnceLock<String>,
        job_id: &mut Option<String>,
    ) -> Result<ItemOutcome, (Stage, PipelineError)> {
        if let Some(reason) = abort.get() {
            return Err((Stage::Pending, PipelineError::Aborted(reason.clone())));
        }
        if cancel.is_cancelled() {
            return Err((Stage::Pending, PipelineError::Cancelled));
        }

        let sql = self.source.resolve(&item.query_id).await.at(Stage::Pending)?;

        let mut job = services
            .executor
            .submit(&sql, &self.config.source_database, &self.config.athena_output_location)
            .await
            .at(Stage::Submitted)?;
        *job_id = Some(job.job_id.clone());

        info!(index = item.index, query_id = %job.job_id, "awaiting result");
        let result = services
            .executor
            .await_completion(&mut job, cancel)
            .await
            .at(Stage::AwaitingResult)?;

        let mut table = TableMaterializer::from_result_set(&result).at(Stage::Materializing)?;
        if table.is_empty() {
            info!(
                index = item.index,
                query_id = %job.job_id,
                "query returned no rows, skipping"
            );
            return Ok(ItemOutcome::SkippedEmpty);
        }

        transform::apply(&mut table).at(Stage::Transforming)?;

        transform::stamp_load_time(&mut table, Utc::now()).at(Stage::Encoding)?;
        let payload = FormatCodec::encode(&table, self.format).at(Stage::Encoding)?;
        let size = payload.len();

        services
            .gateway
            .put(&item.key.key, Bytes::from(payload))
            .await
            .at(Stage::Storing)?;

        let rows = table.row_count();
        info!(
            index = item.index,
            query_id = %job.job_id,
            key = %item.key,
            rows,
            size,
            "artifact written"
        );
        Ok(ItemOutcome::Done {
            key: item.key.clone(),
            rows,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use object_store::memory::InMemory;

    use unload_athena::{AthenaError, JobStatus, PollPolicy, QueryEngine, QueryExecutor, ResultPage};
    use unload_storage::{ObjectStoreGateway, RetryPolicy, StorageError};

    use super::*;
    use crate::query_source::StaticQuerySource;

    /// Any call is a test failure: these tests never reach the engine.
    struct UnreachableEngine;

    #[async_trait]
    impl QueryEngine for UnreachableEngine {
        async fn start_query(&self, _: &str, _: &str, _: &str) -> Result<String, AthenaError> {
            unreachable!("start_query")
        }
        async fn job_status(&self, _: &str) -> Result<JobStatus, AthenaError> {
            unreachable!("job_status")
        }
        async fn stop_query(&self, _: &str) -> Result<(), AthenaError> {
            unreachable!("stop_query")
        }
        async fn results_page(&self, _: &str, _: Option<&str>) -> Result<ResultPage, AthenaError> {
            unreachable!("results_page")
        }
    }

    fn config(format: &str, prefix: Option<&str>) -> PipelineConfig {
        PipelineConfig::from_yaml_str(&format!(
            r#"
aws_role: arn:aws:iam::123456789012:role/reporting
query_files: [a.sql, b.sql, c.sql]
source_database: analytics
athena_output_location: s3://athena-results/tmp/
destination_bucket: processed
file_format: {format}
region: eu-west-1
max_wait_seconds: 30
key_prefix: {}
"#,
            prefix.unwrap_or("~")
        ))
        .unwrap()
    }

    fn orchestrator(format: &str, prefix: Option<&str>) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            config(format, prefix),
            Arc::new(StaticQuerySource::new([
                ("a.sql", "SELECT 1"),
                ("b.sql", "SELECT 2"),
            ])),
        )
        .unwrap()
    }

    fn services() -> RunServices {
        RunServices::new(
            QueryExecutor::new(Arc::new(UnreachableEngine), PollPolicy::default()),
            ObjectStoreGateway::with_store(Arc::new(InMemory::new()), "processed", RetryPolicy::none()),
        )
    }

    #[test]
    fn unsupported_format_rejected_at_construction() {
        let result = PipelineOrchestrator::new(
            config("avro", None),
            Arc::new(StaticQuerySource::default()),
        );
        match result {
            Err(err) => assert!(err.is_fatal()),
            Ok(_) => panic!("avro must be rejected"),
        }
    }

    #[test]
    fn plan_uses_prefix_and_extension() {
        let orch = orchestrator("PARQUET", Some("daily/"));
        assert_eq!(orch.format(), FileFormat::Parquet);

        let keys: Vec<String> = orch.plan().into_iter().map(|p| p.key.key).collect();
        assert_eq!(
            keys,
            vec![
                "daily/processed_data_0.parquet",
                "daily/processed_data_1.parquet",
                "daily/processed_data_2.parquet",
            ]
        );
    }

    #[test]
    fn athena_overrides_from_config() {
        let athena = orchestrator("csv", None).athena_config(AthenaConfig::default());
        assert_eq!(athena.region, "eu-west-1");
        assert_eq!(athena.workgroup, AthenaConfig::default().workgroup);
        assert_eq!(athena.max_wait(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn dry_run_reports_unresolvable_query() {
        let err = orchestrator("csv", None).dry_run().await.unwrap_err();
        assert!(matches!(err, PipelineError::QuerySource { ref id, .. } if id == "c.sql"));
    }

    #[tokio::test]
    async fn items_after_fatal_error_are_not_started() {
        let orch = orchestrator("csv", None);
        let services = services();
        let abort = OnceLock::new();
        let denied = PipelineError::Storage(StorageError::AccessDenied {
            key: "processed_data_0.csv".into(),
            message: "403 Forbidden".into(),
        });
        abort.set(denied.to_string()).unwrap();

        let item = orch.plan().remove(1);
        let report = orch
            .run_item(item, &services, &CancelSignal::never(), &abort)
            .await;

        assert_eq!(report.index, 1);
        assert!(report.job_id.is_none());
        match report.outcome {
            ItemOutcome::Failed {
                stage: Stage::Pending,
                error: PipelineError::Aborted(reason),
            } => assert!(reason.contains("access denied")),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn summary_counts_and_display() {
        let key = ArtifactKey::for_item("processed", None, 0, FileFormat::Csv);
        let summary = RunSummary {
            items: vec![
                ItemReport {
                    index: 0,
                    query_id: "a.sql".into(),
                    job_id: Some("job-0".into()),
                    outcome: ItemOutcome::Done { key, rows: 2 },
                },
                ItemReport {
                    index: 1,
                    query_id: "b.sql".into(),
                    job_id: Some("job-1".into()),
                    outcome: ItemOutcome::SkippedEmpty,
                },
                ItemReport {
                    index: 2,
                    query_id: "c.sql".into(),
                    job_id: None,
                    outcome: ItemOutcome::Failed {
                        stage: Stage::Pending,
                        error: PipelineError::Cancelled,
                    },
                },
            ],
            aborted: None,
            elapsed: Duration::from_millis(1500),
        };

        assert_eq!(
            (summary.succeeded(), summary.skipped_empty(), summary.failed()),
            (1, 1, 1)
        );
        assert!(!summary.is_clean());

        let text = summary.to_string();
        assert!(text.starts_with("1 succeeded, 1 skipped (empty), 1 failed in 1.5s"));
        assert!(text.contains("[0] a.sql: 2 rows -> s3://processed/processed_data_0.csv"));
        assert!(text.contains("[2] c.sql: failed at pending: cancelled"));
    }
}
