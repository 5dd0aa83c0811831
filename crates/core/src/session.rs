use std::fmt;

use chrono::{DateTime, Utc};

/// Temporary credentials scoped to an assumed role.
///
/// Held in memory for one run and shared read-only between query items.
#[derive(Clone)]
pub struct Session {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Expiry reported by the identity service, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Region the session's clients are bound to.
    pub region: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***REDACTED***")
            .field("session_token", &"***REDACTED***")
            .field("expires_at", &self.expires_at)
            .field("region", &self.region)
            .finish()
    }
}
