//! Role assumption through AWS STS.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_types::region::Region;
use chrono::DateTime;
use tracing::{error, info};

use unload_core::Session;

use crate::error::AthenaError;

/// Fixed STS session name for every assumption.
pub const SESSION_NAME: &str = "CrossAccountSession";

/// Exchanges a role identifier for temporary scoped credentials.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Assume `role_arn`. Failures map to [`AthenaError::Authorization`] and
    /// are never retried.
    async fn assume_role(&self, role_arn: &str) -> Result<Session, AthenaError>;
}

/// [`CredentialBroker`] backed by STS `AssumeRole`, calling with the
/// caller's default credential chain.
pub struct StsCredentialBroker {
    client: aws_sdk_sts::Client,
    region: String,
}

impl StsCredentialBroker {
    /// Load the default AWS config for `region` and build an STS client.
    pub async fn new(region: &str) -> Self {
        let aws_cfg = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: aws_sdk_sts::Client::new(&aws_cfg),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn assume_role(&self, role_arn: &str) -> Result<Session, AthenaError> {
        info!(role = %role_arn, session_name = SESSION_NAME, "Assuming role");

        let resp = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(SESSION_NAME)
            .send()
            .await
            .map_err(|e| {
                let msg = DisplayErrorContext(&e).to_string();
                error!(role = %role_arn, error = %msg, "AssumeRole failed");
                AthenaError::Authorization(msg)
            })?;

        let creds = resp.credentials().ok_or_else(|| {
            AthenaError::Authorization("AssumeRole returned no credentials".into())
        })?;

        let expiration = creds.expiration();
        let expires_at = DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos());

        info!(
            role = %role_arn,
            expires_at = ?expires_at,
            "Role assumed"
        );

        Ok(Session {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expires_at,
            region: self.region.clone(),
        })
    }
}
