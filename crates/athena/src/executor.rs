//! Submit, poll and fetch: the query lifecycle on top of a [`QueryEngine`].
//!
//! Results are only read once the job reports a terminal success. Polling
//! backs off exponentially with jitter, gives up after the configured maximum
//! wait (stopping the job on a best-effort basis) and returns promptly when
//! the run is cancelled.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use unload_core::CancelSignal;

use crate::config::AthenaConfig;
use crate::engine::{JobState, QueryEngine, QueryJob};
use crate::error::AthenaError;
use crate::result::ResultSet;

/// Status-poll timing.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Give up on a job that is not terminal after this long.
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&AthenaConfig::default())
    }
}

impl PollPolicy {
    pub fn from_config(config: &AthenaConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.poll_initial_ms),
            max_delay: Duration::from_millis(config.poll_max_ms.max(config.poll_initial_ms)),
            backoff_factor: 1.5,
            max_wait: config.max_wait(),
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff_factor).min(self.max_delay)
    }
}

/// Jitter in `[0, 100)` ms from the sub-second clock, no RNG needed.
fn jitter() -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    Duration::from_millis(u64::from(nanos % 100))
}

/// Runs queries to completion on a shared engine.
#[derive(Clone)]
pub struct QueryExecutor {
    engine: Arc<dyn QueryEngine>,
    policy: PollPolicy,
}

impl QueryExecutor {
    pub fn new(engine: Arc<dyn QueryEngine>, policy: PollPolicy) -> Self {
        Self { engine, policy }
    }

    /// Start a query. Returns immediately with the job in `Submitted` state.
    pub async fn submit(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<QueryJob, AthenaError> {
        let job_id = self
            .engine
            .start_query(sql, database, output_location)
            .await
            .map_err(|e| match e {
                AthenaError::QuerySubmission(_) => e,
                other => AthenaError::QuerySubmission(other.to_string()),
            })?;

        info!(query_id = %job_id, database = %database, "Query execution started");

        Ok(QueryJob {
            sql: sql.to_string(),
            database: database.to_string(),
            output_location: output_location.to_string(),
            job_id,
            state: JobState::Submitted,
        })
    }

    /// Poll until `job` is terminal, then fetch all result rows.
    ///
    /// `job.state` is updated with every observation.
    pub async fn await_completion(
        &self,
        job: &mut QueryJob,
        cancel: &CancelSignal,
    ) -> Result<ResultSet, AthenaError> {
        self.poll_until_complete(job, cancel).await?;
        self.fetch_results(&job.job_id).await
    }

    async fn poll_until_complete(
        &self,
        job: &mut QueryJob,
        cancel: &CancelSignal,
    ) -> Result<(), AthenaError> {
        let start = Instant::now();
        let deadline = start + self.policy.max_wait;
        let mut delay = self.policy.initial_delay;

        loop {
            let status = tokio::select! {
                _ = cancel.cancelled() => return Err(self.abandon(job).await),
                status = self.engine.job_status(&job.job_id) => status?,
            };
            job.state = status.state;

            debug!(
                query_id = %job.job_id,
                state = ?status.state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling query status"
            );

            match status.state {
                JobState::Succeeded => return Ok(()),
                JobState::Failed => {
                    let reason = status.reason.unwrap_or_else(|| "unknown".to_string());
                    error!(query_id = %job.job_id, reason = %reason, "Query failed");
                    return Err(AthenaError::QueryFailed {
                        query_id: job.job_id.clone(),
                        reason,
                    });
                }
                JobState::Submitted | JobState::Running => {}
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    query_id = %job.job_id,
                    max_wait_secs = self.policy.max_wait.as_secs(),
                    "Query timed out, cancelling"
                );
                // Best-effort cancel, the timeout is what gets reported.
                let _ = self.engine.stop_query(&job.job_id).await;
                job.state = JobState::Failed;
                return Err(AthenaError::QueryTimeout {
                    query_id: job.job_id.clone(),
                    seconds: self.policy.max_wait.as_secs(),
                });
            }

            // Never sleep past the deadline.
            let sleep_for = (delay + jitter()).min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.abandon(job).await),
                _ = tokio::time::sleep(sleep_for) => {}
            }

            delay = self.policy.next_delay(delay);
        }
    }

    async fn abandon(&self, job: &mut QueryJob) -> AthenaError {
        warn!(query_id = %job.job_id, "Run cancelled, stopping query");
        let _ = self.engine.stop_query(&job.job_id).await;
        job.state = JobState::Failed;
        AthenaError::Cancelled {
            query_id: job.job_id.clone(),
        }
    }

    /// Follow continuation tokens until exhausted, keeping row order.
    async fn fetch_results(&self, job_id: &str) -> Result<ResultSet, AthenaError> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .engine
                .results_page(job_id, next_token.as_deref())
                .await?;
            pages += 1;
            rows.extend(page.rows);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        info!(
            query_id = %job_id,
            rows = rows.len().saturating_sub(1),
            pages,
            "Fetched query results"
        );

        Ok(ResultSet::new(job_id, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JobStatus, ResultPage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use unload_core::cancel_pair;

    /// Engine that replays a fixed status sequence (the last one repeats)
    /// and serves result pages from a list.
    struct ScriptedEngine {
        statuses: Mutex<VecDeque<JobStatus>>,
        pages: Vec<ResultPage>,
        calls: Mutex<Vec<String>>,
        submit_error: Option<String>,
    }

    impl ScriptedEngine {
        fn new(statuses: Vec<JobStatus>, pages: Vec<ResultPage>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                pages,
                calls: Mutex::new(Vec::new()),
                submit_error: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryEngine for ScriptedEngine {
        async fn start_query(&self, _: &str, _: &str, _: &str) -> Result<String, AthenaError> {
            self.calls.lock().unwrap().push("start".into());
            match &self.submit_error {
                Some(msg) => Err(AthenaError::AwsSdk(msg.clone())),
                None => Ok("job-1".into()),
            }
        }

        async fn job_status(&self, _: &str) -> Result<JobStatus, AthenaError> {
            self.calls.lock().unwrap().push("status".into());
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.pop_front().unwrap())
            } else {
                Ok(statuses.front().cloned().unwrap())
            }
        }

        async fn stop_query(&self, _: &str) -> Result<(), AthenaError> {
            self.calls.lock().unwrap().push("stop".into());
            Ok(())
        }

        async fn results_page(
            &self,
            _: &str,
            next_token: Option<&str>,
        ) -> Result<ResultPage, AthenaError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("page:{}", next_token.unwrap_or("-")));
            let idx = next_token.map(|t| t.parse::<usize>().unwrap()).unwrap_or(0);
            Ok(self.pages[idx].clone())
        }
    }

    fn page(rows: &[&[&str]], next: Option<&str>) -> ResultPage {
        ResultPage {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
            next_token: next.map(str::to_string),
        }
    }

    fn policy(max_wait_secs: u64) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
            backoff_factor: 1.5,
            max_wait: Duration::from_secs(max_wait_secs),
        }
    }

    async fn submit(exec: &QueryExecutor) -> QueryJob {
        exec.submit("SELECT 1", "db", "s3://out/").await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_success_then_fetches_all_pages() {
        let engine = Arc::new(ScriptedEngine::new(
            vec![
                JobStatus::new(JobState::Submitted),
                JobStatus::new(JobState::Running),
                JobStatus::new(JobState::Succeeded),
            ],
            vec![
                page(&[&["existing_column"], &["5"]], Some("1")),
                page(&[&["10"]], Some("2")),
                page(&[&["15"]], None),
            ],
        ));
        let exec = QueryExecutor::new(engine.clone(), policy(60));

        let mut job = submit(&exec).await;
        assert_eq!(job.state, JobState::Submitted);

        let result = exec
            .await_completion(&mut job, &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(result.job_id, "job-1");
        assert_eq!(result.row_count(), 3);
        let values: Vec<_> = result
            .data_rows()
            .iter()
            .map(|r| r[0].clone().unwrap())
            .collect();
        assert_eq!(values, vec!["5", "10", "15"]);

        // No result fetch before the terminal state.
        let calls = engine.calls();
        let first_page = calls.iter().position(|c| c.starts_with("page")).unwrap();
        let last_status = calls.iter().rposition(|c| c == "status").unwrap();
        assert!(last_status < first_page);
        assert_eq!(&calls[first_page..], &["page:-", "page:1", "page:2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_carries_reason_and_skips_fetch() {
        let engine = Arc::new(ScriptedEngine::new(
            vec![
                JobStatus::new(JobState::Running),
                JobStatus::failed("SYNTAX_ERROR: line 1:1"),
            ],
            vec![],
        ));
        let exec = QueryExecutor::new(engine.clone(), policy(60));
        let mut job = submit(&exec).await;

        let err = exec
            .await_completion(&mut job, &CancelSignal::never())
            .await
            .unwrap_err();

        match err {
            AthenaError::QueryFailed { query_id, reason } => {
                assert_eq!(query_id, "job-1");
                assert!(reason.contains("SYNTAX_ERROR"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(job.state, JobState::Failed);
        assert!(!engine.calls().iter().any(|c| c.starts_with("page")));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_stops_job() {
        let engine = Arc::new(ScriptedEngine::new(
            vec![JobStatus::new(JobState::Running)],
            vec![],
        ));
        let exec = QueryExecutor::new(engine.clone(), policy(10));
        let mut job = submit(&exec).await;

        let started = Instant::now();
        let err = exec
            .await_completion(&mut job, &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, AthenaError::QueryTimeout { seconds: 10, .. }));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(13));
        assert_eq!(engine.calls().last().map(String::as_str), Some("stop"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling_promptly() {
        let engine = Arc::new(ScriptedEngine::new(
            vec![JobStatus::new(JobState::Running)],
            vec![],
        ));
        let exec = QueryExecutor::new(engine.clone(), policy(3600));
        let mut job = submit(&exec).await;

        let (handle, signal) = cancel_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let err = exec.await_completion(&mut job, &signal).await.unwrap_err();
        assert!(matches!(err, AthenaError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(8));
        assert!(engine.calls().contains(&"stop".to_string()));
    }

    #[tokio::test]
    async fn submit_errors_become_submission_errors() {
        let mut engine = ScriptedEngine::new(vec![JobStatus::new(JobState::Running)], vec![]);
        engine.submit_error = Some("InvalidRequestException: database missing".into());
        let exec = QueryExecutor::new(Arc::new(engine), policy(60));

        let err = exec.submit("SELECT", "nope", "s3://out/").await.unwrap_err();
        assert!(matches!(err, AthenaError::QuerySubmission(ref m) if m.contains("database missing")));
    }

    #[test]
    fn backoff_is_capped() {
        let p = policy(60);
        let mut d = p.initial_delay;
        for _ in 0..20 {
            d = p.next_delay(d);
        }
        assert_eq!(d, p.max_delay);
        assert_eq!(p.next_delay(Duration::from_millis(200)), Duration::from_millis(300));
    }

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..1000 {
            assert!(jitter() < Duration::from_millis(100));
        }
    }
}
