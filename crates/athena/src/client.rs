//! AWS Athena client bound to an assumed-role session.
//!
//! [`AthenaClient`] implements [`QueryEngine`] with the raw SDK calls:
//! `StartQueryExecution`, `GetQueryExecution`, `StopQueryExecution` and
//! `GetQueryResults`. Polling and pagination live in
//! [`QueryExecutor`](crate::executor::QueryExecutor).

use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_athena::config::Credentials;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_types::region::Region;
use tracing::{debug, info};

use unload_core::Session;

use crate::config::AthenaConfig;
use crate::engine::{JobState, JobStatus, QueryEngine, ResultPage};
use crate::error::AthenaError;

/// Client for executing queries against AWS Athena.
pub struct AthenaClient {
    config: AthenaConfig,
    athena_client: aws_sdk_athena::Client,
}

impl AthenaClient {
    /// Build a client that signs every call with the session's credentials.
    ///
    /// There is no fallback to the default credential chain.
    pub fn new(session: &Session, config: AthenaConfig) -> Self {
        let credentials = Credentials::new(
            session.access_key_id.clone(),
            session.secret_access_key.clone(),
            Some(session.session_token.clone()),
            session.expires_at.map(SystemTime::from),
            "unload-assumed-role",
        );

        let sdk_config = aws_sdk_athena::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(session.region.clone()))
            .credentials_provider(credentials)
            .build();

        let athena_client = aws_sdk_athena::Client::from_conf(sdk_config);

        info!(
            region = %session.region,
            workgroup = %config.workgroup,
            "AthenaClient initialised"
        );

        Self {
            config,
            athena_client,
        }
    }
}

/// Map the SDK execution state onto the pipeline's job states.
///
/// Athena's CANCELLED is terminal without results, so it counts as failed.
fn map_state(state: Option<&QueryExecutionState>, reason: Option<&str>) -> JobStatus {
    match state {
        Some(QueryExecutionState::Succeeded) => JobStatus::new(JobState::Succeeded),
        Some(QueryExecutionState::Failed) => {
            JobStatus::failed(reason.unwrap_or("unknown"))
        }
        Some(QueryExecutionState::Cancelled) => JobStatus::failed(format!(
            "cancelled: {}",
            reason.unwrap_or("no reason given")
        )),
        Some(QueryExecutionState::Running) => JobStatus::new(JobState::Running),
        // Queued, missing, or unknown future variant
        _ => JobStatus::new(JobState::Submitted),
    }
}

#[async_trait]
impl QueryEngine for AthenaClient {
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<String, AthenaError> {
        let resp = self
            .athena_client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(QueryExecutionContext::builder().database(database).build())
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            )
            .work_group(&self.config.workgroup)
            .send()
            .await
            .map_err(|e| AthenaError::QuerySubmission(DisplayErrorContext(&e).to_string()))?;

        resp.query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| AthenaError::QuerySubmission("No query execution ID returned".into()))
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, AthenaError> {
        let resp = self
            .athena_client
            .get_query_execution()
            .query_execution_id(job_id)
            .send()
            .await
            .map_err(|e| AthenaError::AwsSdk(DisplayErrorContext(&e).to_string()))?;

        let status = resp.query_execution().and_then(|qe| qe.status());
        Ok(map_state(
            status.and_then(|s| s.state()),
            status.and_then(|s| s.state_change_reason()),
        ))
    }

    async fn stop_query(&self, job_id: &str) -> Result<(), AthenaError> {
        info!(query_id = %job_id, "Cancelling query");

        self.athena_client
            .stop_query_execution()
            .query_execution_id(job_id)
            .send()
            .await
            .map_err(|e| AthenaError::AwsSdk(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn results_page(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage, AthenaError> {
        let output = self
            .athena_client
            .get_query_results()
            .query_execution_id(job_id)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| AthenaError::AwsSdk(DisplayErrorContext(&e).to_string()))?;

        let rows: Vec<Vec<Option<String>>> = output
            .result_set()
            .map(|rs| {
                rs.rows()
                    .iter()
                    .map(|row| {
                        row.data()
                            .iter()
                            .map(|datum| datum.var_char_value().map(str::to_string))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            query_id = %job_id,
            rows = rows.len(),
            has_more = output.next_token().is_some(),
            "Fetched result page"
        );

        Ok(ResultPage {
            rows,
            next_token: output.next_token().map(str::to_string),
        })
    }
}
