use crate::FaultKind;

/// Error type returned by this crate.
///
/// A completed HTTP response is never an error, whatever its status; callers
/// receive non-ok responses back from [`crate::RequestExecutor::execute`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Transport failure that was fatal or ran out of attempts.
    #[error("transport error on attempt {attempt} ({kind}): {source}")]
    Transport {
        /// 1-based index of the attempt that raised.
        attempt: u32,
        /// Classified fault kind.
        kind: FaultKind,
        /// Original error from `reqwest`.
        #[source]
        source: reqwest::Error,
    },
    /// The final attempt exceeded the per-attempt timeout.
    #[error("attempt {attempt} timed out after {timeout_ms} ms")]
    Timeout { attempt: u32, timeout_ms: u64 },
    /// The caller-supplied cancellation token fired.
    #[error("request cancelled by caller during attempt {attempt}")]
    Cancelled { attempt: u32 },
    /// Request body serialization failed.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    /// Invalid configuration override.
    #[error("config error: {0}")]
    Config(String),
}

impl ExecutorError {
    /// Returns the attempt on which the call ended, when one was made.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            Self::Transport { attempt, .. }
            | Self::Timeout { attempt, .. }
            | Self::Cancelled { attempt } => Some(*attempt),
            Self::Encode(_) | Self::Config(_) => None,
        }
    }
}
