//! AWS-facing collaborators, all built from one assumed-role session.

use std::sync::Arc;

use unload_athena::{AthenaClient, AthenaConfig, CredentialBroker, PollPolicy, QueryExecutor};
use unload_core::{CancelSignal, PipelineConfig, Session};
use unload_storage::{ObjectStoreGateway, RetryPolicy};

use crate::error::PipelineError;
use crate::orchestrator::{PipelineOrchestrator, RunSummary};
use crate::query_source::QuerySource;

pub struct RunServices {
    pub executor: QueryExecutor,
    pub gateway: ObjectStoreGateway,
}

impl RunServices {
    pub fn new(executor: QueryExecutor, gateway: ObjectStoreGateway) -> Self {
        Self { executor, gateway }
    }

    /// Athena client and S3 gateway, both signing with `session`.
    pub fn connect(
        session: &Session,
        athena: AthenaConfig,
        bucket: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, PipelineError> {
        let policy = PollPolicy::from_config(&athena);
        let engine = AthenaClient::new(session, athena);
        let executor = QueryExecutor::new(Arc::new(engine), policy);
        let gateway = ObjectStoreGateway::for_session(session, bucket, endpoint, RetryPolicy::default())?;
        Ok(Self::new(executor, gateway))
    }
}

/// Validate `config`, assume its role once, then run every query item.
///
/// Returns `Err` only for errors that stop the run before it starts; item
/// failures and mid-run aborts are reported in the [`RunSummary`].
pub async fn execute(
    config: PipelineConfig,
    source: Arc<dyn QuerySource>,
    broker: &dyn CredentialBroker,
    athena: AthenaConfig,
    endpoint: Option<&str>,
    cancel: &CancelSignal,
) -> Result<RunSummary, PipelineError> {
    let orchestrator = PipelineOrchestrator::new(config, source)?;
    let athena = orchestrator.athena_config(athena);

    let session = broker.assume_role(&orchestrator.config().aws_role).await?;
    let services = RunServices::connect(
        &session,
        athena,
        &orchestrator.config().destination_bucket,
        endpoint,
    )?;

    Ok(orchestrator.run(&services, cancel).await)
}
