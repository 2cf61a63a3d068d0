//! Wait computation between attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::RequestOptions;

/// Symmetric jitter applied around the exponential base.
const JITTER: f64 = 0.15;
/// Doublings stop growing the base after this many attempts.
const MAX_EXPONENT: u32 = 16;

/// Where a retry wait came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitSource {
    /// Server-supplied `Retry-After`.
    Header,
    /// Computed exponential backoff.
    Backoff,
}

/// Decision taken after a failed attempt.
///
/// `wait` is meaningless when `should_retry` is false.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub wait: Duration,
    pub source: WaitSource,
}

impl RetryDecision {
    /// Plans the wait after `attempt` (1-based) failed.
    ///
    /// A strictly positive header hint wins over computed backoff; a hint
    /// that is absent, unparseable or resolves to zero falls back to it.
    pub fn plan(
        options: &RequestOptions,
        attempt: u32,
        retry_after: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let should_retry = attempt < options.max_attempts();
        let hint = retry_after
            .and_then(|value| parse_retry_after(value, options.max_retry_after_secs, now));

        match hint {
            Some(wait) => Self {
                should_retry,
                wait,
                source: WaitSource::Header,
            },
            None => Self {
                should_retry,
                wait: jittered_backoff(options.backoff_base_ms, attempt),
                source: WaitSource::Backoff,
            },
        }
    }
}

/// Parses a `Retry-After` value as delta-seconds or an HTTP date, clamped to
/// `max_secs`. Returns `None` when unparseable or when the wait is zero.
pub fn parse_retry_after(value: &str, max_secs: u64, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    let cap = Duration::from_secs(max_secs);

    let is_delta_seconds = !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());

    let wait = match value.parse::<u64>() {
        Ok(secs) if is_delta_seconds => Duration::from_secs(secs.min(max_secs)),
        _ => {
            let date = DateTime::parse_from_rfc2822(value).ok()?;
            // A date in the past converts to an error; treat as zero.
            date.with_timezone(&Utc)
                .signed_duration_since(now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(cap)
        }
    };

    (!wait.is_zero()).then_some(wait)
}

/// `base_ms * 2^(attempt-1)` without jitter.
pub fn exponential_backoff(base_ms: u64, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(MAX_EXPONENT);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exp))
}

fn jittered_backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = rand::rng().random_range(1.0 - JITTER..=1.0 + JITTER);
    apply_jitter(exponential_backoff(base_ms, attempt), factor)
}

fn apply_jitter(base: Duration, factor: f64) -> Duration {
    let millis = (base.as_millis() as f64 * factor).round().max(0.0);
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0)
            .single()
            .expect("valid timestamp")
    }

    fn options(retries: u32) -> RequestOptions {
        RequestOptions {
            retries,
            ..RequestOptions::default()
        }
    }

    #[test]
    fn integer_hint_is_used_verbatim() {
        assert_eq!(
            parse_retry_after("7", 120, now()),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_after(" 120 ", 120, now()),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn integer_hint_is_clamped() {
        assert_eq!(
            parse_retry_after("3600", 120, now()),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn future_date_hint_counts_down_from_now() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", 120, now()),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 09:00:00 GMT", 120, now()),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn zero_past_and_garbage_hints_are_absent() {
        assert_eq!(parse_retry_after("0", 120, now()), None);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", 120, now()),
            None
        );
        assert_eq!(parse_retry_after("-5", 120, now()), None);
        assert_eq!(parse_retry_after("+5", 120, now()), None);
        assert_eq!(parse_retry_after("5.0", 120, now()), None);
        assert_eq!(parse_retry_after("soon", 120, now()), None);
        assert_eq!(parse_retry_after("", 120, now()), None);
    }

    #[test]
    fn header_hint_wins_regardless_of_attempt() {
        for attempt in 1..=3 {
            let decision = RetryDecision::plan(&options(3), attempt, Some("4"), now());
            assert!(decision.should_retry);
            assert_eq!(decision.source, WaitSource::Header);
            assert_eq!(decision.wait, Duration::from_secs(4));
        }
    }

    #[test]
    fn unparseable_hint_falls_back_to_backoff() {
        let decision = RetryDecision::plan(&options(3), 1, Some("later"), now());
        assert_eq!(decision.source, WaitSource::Backoff);
        assert!(decision.wait >= Duration::from_millis(425));
        assert!(decision.wait <= Duration::from_millis(575));
    }

    #[test]
    fn backoff_stays_within_jitter_bounds() {
        let opts = options(8);
        for attempt in 1..=8u32 {
            let base = 500u64 << (attempt - 1);
            let low = Duration::from_millis((base as f64 * 0.85).round() as u64);
            let high = Duration::from_millis((base as f64 * 1.15).round() as u64);
            for _ in 0..50 {
                let decision = RetryDecision::plan(&opts, attempt, None, now());
                assert_eq!(decision.source, WaitSource::Backoff);
                assert!(
                    decision.wait >= low && decision.wait <= high,
                    "attempt {attempt}: {:?} not in [{low:?}, {high:?}]",
                    decision.wait
                );
            }
        }
    }

    #[test]
    fn jitter_extremes_round_to_whole_millis() {
        let base = Duration::from_millis(1_000);
        assert_eq!(apply_jitter(base, 0.85), Duration::from_millis(850));
        assert_eq!(apply_jitter(base, 1.15), Duration::from_millis(1_150));
    }

    #[test]
    fn exponential_growth_is_capped() {
        assert_eq!(exponential_backoff(500, 1), Duration::from_millis(500));
        assert_eq!(exponential_backoff(500, 2), Duration::from_millis(1_000));
        assert_eq!(exponential_backoff(500, 4), Duration::from_millis(4_000));
        assert_eq!(
            exponential_backoff(1, 40),
            exponential_backoff(1, MAX_EXPONENT + 1)
        );
        assert_eq!(
            exponential_backoff(u64::MAX, 10),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn budget_exhaustion_disables_retry() {
        let opts = options(2);
        assert!(RetryDecision::plan(&opts, 1, None, now()).should_retry);
        assert!(RetryDecision::plan(&opts, 2, None, now()).should_retry);
        assert!(!RetryDecision::plan(&opts, 3, None, now()).should_retry);
        assert!(!RetryDecision::plan(&options(0), 1, None, now()).should_retry);
    }
}
