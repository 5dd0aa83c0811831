/// Errors that can occur during STS and Athena operations.
#[derive(Debug, thiserror::Error)]
pub enum AthenaError {
    /// The role could not be assumed. Fatal for the run.
    #[error("Cannot assume role: {0}")]
    Authorization(String),

    /// Athena rejected the query at submission time.
    #[error("Query submission failed: {0}")]
    QuerySubmission(String),

    /// The query execution failed (or was cancelled) on the Athena side.
    #[error("Query {query_id} failed: {reason}")]
    QueryFailed { query_id: String, reason: String },

    /// The query did not finish within the configured maximum wait.
    #[error("Query {query_id} timed out after {seconds}s")]
    QueryTimeout { query_id: String, seconds: u64 },

    /// The run was cancelled while the query was still in flight.
    #[error("Query {query_id} abandoned: run cancelled")]
    Cancelled { query_id: String },

    /// The fetched result rows do not form a valid table.
    #[error("Malformed result: {0}")]
    MalformedResult(String),

    /// An AWS SDK error (stringified).
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}
