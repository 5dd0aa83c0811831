//! Bounded exponential backoff for transient object-store failures.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before try `attempt + 1`, `attempt` counting from 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` is used up. The surfaced transient error carries the
/// number of attempts made.
pub async fn retry_transient<T, F, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(StorageError::Transient { key, message, .. }) => {
                if attempt >= max_attempts {
                    error!(
                        operation = operation_name,
                        key = %key,
                        attempts = attempt,
                        "giving up: {message}"
                    );
                    return Err(StorageError::Transient {
                        key,
                        attempts: attempt,
                        message,
                    });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    key = %key,
                    "transient failure, retrying in {:?} (attempt {}/{}): {}",
                    delay,
                    attempt,
                    max_attempts,
                    message
                );
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}
