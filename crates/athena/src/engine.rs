//! The query-service seam.
//!
//! [`QueryEngine`] is the minimal set of remote calls the executor needs.
//! [`AthenaClient`](crate::client::AthenaClient) implements it over the AWS
//! SDK; tests drive the executor with scripted engines.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AthenaError;

/// Lifecycle state of a submitted query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Submitted,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// One status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    /// Engine-provided reason, set for failures.
    pub reason: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self { state, reason: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// A submitted query and its last observed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryJob {
    pub sql: String,
    pub database: String,
    pub output_location: String,
    pub job_id: String,
    pub state: JobState,
}

/// One page of raw result rows plus the continuation token, if any.
#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Start a query and return its execution id.
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<String, AthenaError>;

    /// Current state of an execution.
    async fn job_status(&self, job_id: &str) -> Result<JobStatus, AthenaError>;

    /// Request cancellation of an execution.
    async fn stop_query(&self, job_id: &str) -> Result<(), AthenaError>;

    /// Fetch one page of results. Only valid after the job succeeded.
    async fn results_page(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage, AthenaError>;
}
