use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{Classification, WaitSource};

/// Timing and outcome of one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptRecord {
    /// 1-based attempt index.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub classification: Classification,
    /// Wait slept before the next attempt, if one followed.
    pub wait: Option<(Duration, WaitSource)>,
}

/// Attempts made by one successful `execute_with_report` call, in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionReport {
    pub attempts: Vec<AttemptRecord>,
    /// Wall-clock time across all attempts and waits.
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Retries consumed beyond the first attempt.
    pub fn retries(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }

    /// Total time spent sleeping between attempts.
    pub fn waited(&self) -> Duration {
        self.attempts
            .iter()
            .filter_map(|record| record.wait.map(|(wait, _)| wait))
            .sum()
    }
}
