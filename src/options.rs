use serde::{Deserialize, Serialize};

use crate::{ExecutorError, Result};

/// Environment variable overriding [`RequestOptions::timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "PROBE_TIMEOUT_MS";
/// Environment variable overriding [`RequestOptions::retries`].
pub const ENV_RETRIES: &str = "PROBE_RETRIES";
/// Environment variable overriding [`RequestOptions::backoff_base_ms`].
pub const ENV_BACKOFF_BASE_MS: &str = "PROBE_BACKOFF_BASE_MS";
/// Environment variable overriding [`RequestOptions::max_retry_after_secs`].
pub const ENV_MAX_RETRY_AFTER_SECS: &str = "PROBE_MAX_RETRY_AFTER_SECS";

/// Configures per-attempt timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub retries: u32,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub backoff_base_ms: u64,
    /// Upper bound applied to any server-supplied `Retry-After` wait.
    pub max_retry_after_secs: u64,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            retries: 3,
            backoff_base_ms: 500,
            max_retry_after_secs: 120,
        }
    }
}

impl RequestOptions {
    /// Total attempts allowed per call, including the first. Never zero.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Builds options from the defaults overridden by `PROBE_*` environment
    /// variables.
    ///
    /// Reads:
    /// - `PROBE_TIMEOUT_MS`
    /// - `PROBE_RETRIES`
    /// - `PROBE_BACKOFF_BASE_MS`
    /// - `PROBE_MAX_RETRY_AFTER_SECS`
    ///
    /// Unset variables keep their default. A variable that is set but empty
    /// or not a non-negative integer is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RequestOptions::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(value) = read_var(&lookup, ENV_TIMEOUT_MS)? {
            options.timeout_ms = value;
        }
        if let Some(value) = read_var(&lookup, ENV_RETRIES)? {
            options.retries = value;
        }
        if let Some(value) = read_var(&lookup, ENV_BACKOFF_BASE_MS)? {
            options.backoff_base_ms = value;
        }
        if let Some(value) = read_var(&lookup, ENV_MAX_RETRY_AFTER_SECS)? {
            options.max_retry_after_secs = value;
        }
        Ok(options)
    }
}

fn read_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExecutorError::Config(format!("{key} is set but empty")));
    }
    trimmed.parse().map(Some).map_err(|_| {
        ExecutorError::Config(format!(
            "{key} must be a non-negative integer, got '{trimmed}'"
        ))
    })
}
