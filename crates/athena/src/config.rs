use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_REGION: &str = "us-east-1";

// ── Env helpers ──────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── AthenaConfig ─────────────────────────────────────────────────

/// Connection and polling settings for Athena.
///
/// Reads from environment variables with optional profile prefix.
/// When `UNLOAD_PROFILE=PROD`, checks `PROD_ATHENA_WORKGROUP` before
/// `ATHENA_WORKGROUP`. Values from the pipeline YAML are applied on top with
/// [`AthenaConfig::with_overrides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// AWS region for STS, Athena and S3.
    pub region: String,
    /// Athena workgroup.
    pub workgroup: String,
    /// Maximum time to wait for one query to reach a terminal state.
    pub timeout_seconds: u64,
    /// First status-poll delay.
    pub poll_initial_ms: u64,
    /// Upper bound for the status-poll delay.
    pub poll_max_ms: u64,
}

impl Default for AthenaConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            workgroup: "primary".to_string(),
            timeout_seconds: 300,
            poll_initial_ms: 200,
            poll_max_ms: 2000,
        }
    }
}

impl AthenaConfig {
    /// Build config from environment variables.
    ///
    /// Reads `UNLOAD_PROFILE` to determine profile prefix.
    /// `ATHENA_REGION` falls back to `AWS_REGION` before using the default.
    pub fn from_env() -> Self {
        let profile = env_opt("UNLOAD_PROFILE")
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        Self::from_env_profiled(&profile)
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        let defaults = Self::default();
        let region = profiled_env_opt(profile, "ATHENA_REGION")
            .or_else(|| profiled_env_opt(profile, "AWS_REGION"))
            .unwrap_or(defaults.region);

        Self {
            region,
            workgroup: profiled_env_or(profile, "ATHENA_WORKGROUP", &defaults.workgroup),
            timeout_seconds: profiled_env_u64(
                profile,
                "ATHENA_TIMEOUT_SECONDS",
                defaults.timeout_seconds,
            ),
            poll_initial_ms: profiled_env_u64(
                profile,
                "ATHENA_POLL_INITIAL_MS",
                defaults.poll_initial_ms,
            ),
            poll_max_ms: profiled_env_u64(profile, "ATHENA_POLL_MAX_MS", defaults.poll_max_ms),
        }
    }

    /// Apply values set explicitly in the pipeline config.
    pub fn with_overrides(
        mut self,
        region: Option<&str>,
        workgroup: Option<&str>,
        max_wait_seconds: Option<u64>,
    ) -> Self {
        if let Some(region) = region.filter(|r| !r.is_empty()) {
            self.region = region.to_string();
        }
        if let Some(workgroup) = workgroup.filter(|w| !w.is_empty()) {
            self.workgroup = workgroup.to_string();
        }
        if let Some(secs) = max_wait_seconds {
            self.timeout_seconds = secs;
        }
        self
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ── Tests ────────────────────────────────────────────────────────
