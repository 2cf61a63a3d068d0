//! `probe-http` is a resilient HTTP request executor for API monitoring probes.
//!
//! One call to [`RequestExecutor::execute`] issues a request with a bounded
//! per-attempt timeout and retries it when the outcome is transient:
//! - 429 and 5xx responses are retried, then handed back as-is
//! - other non-ok responses are handed back immediately
//! - transient transport faults (resets, refused connections, DNS hiccups,
//!   the executor's own timeout) are retried, then raised
//! - anything else is raised at once
//!
//! Waits follow a server `Retry-After` hint when one is present and
//! otherwise grow exponentially with ±15% jitter.

mod backoff;
mod classify;
mod diagnostics;
mod error;
mod executor;
mod options;
mod request;
mod types;

pub use backoff::{exponential_backoff, parse_retry_after, RetryDecision, WaitSource};
pub use classify::{classify_fault, classify_status, Classification, FaultKind};
pub use diagnostics::{BODY_SNIPPET_CHARS, ERROR_CHAIN_LINES};
pub use error::ExecutorError;
pub use executor::RequestExecutor;
pub use options::{
    RequestOptions, ENV_BACKOFF_BASE_MS, ENV_MAX_RETRY_AFTER_SECS, ENV_RETRIES, ENV_TIMEOUT_MS,
};
pub use request::RequestConfig;
pub use types::{AttemptRecord, ExecutionReport};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ExecutorError>;
