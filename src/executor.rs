use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{header::RETRY_AFTER, Response};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    backoff::RetryDecision,
    classify::{classify_fault, classify_status},
    diagnostics::{body_snippet, error_chain},
    AttemptRecord, Classification, ExecutionReport, ExecutorError, FaultKind, RequestConfig,
    RequestOptions, Result,
};

/// Issues HTTP requests with bounded attempts, per-attempt timeouts and
/// `Retry-After` aware backoff.
///
/// Cloning is cheap; clones share the underlying connection pool and nothing
/// else. Each call owns its attempt loop.
#[derive(Clone, Debug, Default)]
pub struct RequestExecutor {
    http: reqwest::Client,
    options: RequestOptions,
}

/// Why a single attempt ended without a response.
enum Fault {
    Transport(reqwest::Error),
    TimedOut,
    Cancelled,
}

impl Fault {
    fn kind(&self) -> FaultKind {
        match self {
            Self::Transport(err) => FaultKind::of(err),
            Self::TimedOut => FaultKind::Aborted,
            Self::Cancelled => FaultKind::Cancelled,
        }
    }

    fn log(&self, url: &str, attempt: u32, max_attempts: u32, timeout_ms: u64, kind: FaultKind) {
        match self {
            Self::TimedOut => warn!(
                url,
                timeout_ms,
                "attempt {attempt}/{max_attempts} aborted: no response within {timeout_ms} ms"
            ),
            Self::Cancelled => warn!(url, "attempt {attempt}/{max_attempts} cancelled by caller"),
            Self::Transport(err) => warn!(
                url,
                kind = %kind,
                status = err.status().map(|status| status.as_u16()),
                error = %err,
                chain = %error_chain(err),
                "attempt {attempt}/{max_attempts} raised transport error"
            ),
        }
    }

    fn into_error(self, attempt: u32, kind: FaultKind, timeout_ms: u64) -> ExecutorError {
        match self {
            Self::Transport(source) => ExecutorError::Transport {
                attempt,
                kind,
                source,
            },
            Self::TimedOut => ExecutorError::Timeout {
                attempt,
                timeout_ms,
            },
            Self::Cancelled => ExecutorError::Cancelled { attempt },
        }
    }
}

impl RequestExecutor {
    /// Creates an executor with a fresh `reqwest::Client` and default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor around an existing client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            options: RequestOptions::default(),
        }
    }

    /// Creates an executor whose defaults are overridden by `PROBE_*`
    /// environment variables. See [`RequestOptions::from_env`].
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().with_options(RequestOptions::from_env()?))
    }

    /// Applies default options used by calls that do not override them.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Default options for calls.
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Executes a request, retrying transient failures.
    ///
    /// Returns any completed response, including non-ok ones: terminal
    /// statuses come back immediately, retryable statuses (429, 5xx) come back
    /// once attempts are exhausted. Fails only for transport faults that were
    /// fatal or ran out of attempts, and for caller cancellation.
    pub async fn execute(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.execute_with_report(url, config)
            .await
            .map(|(response, _)| response)
    }

    /// Same as [`RequestExecutor::execute`], also returning per-attempt timings.
    pub async fn execute_with_report(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<(Response, ExecutionReport)> {
        let options = config.options.as_ref().unwrap_or(&self.options);
        let max_attempts = options.max_attempts();
        let call_started = Instant::now();
        let mut report = ExecutionReport::default();
        let mut attempt = 1u32;

        loop {
            info!(
                url,
                sequence = config.sequence,
                "attempt {attempt}/{max_attempts}"
            );
            let started_at = Utc::now();
            let attempt_started = Instant::now();
            let outcome = self.send_once(url, &config, options).await;
            let elapsed = attempt_started.elapsed();

            let mut record = AttemptRecord {
                attempt,
                started_at,
                elapsed,
                classification: Classification::Success,
                wait: None,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if (config.is_ok)(status) {
                        debug!(
                            url,
                            status = status.as_u16(),
                            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                            "attempt {attempt}/{max_attempts} succeeded"
                        );
                        report.attempts.push(record);
                        report.elapsed = call_started.elapsed();
                        return Ok((response, report));
                    }

                    // 2xx rejected by a caller predicate is still never retried.
                    record.classification = match classify_status(status) {
                        Classification::Success => Classification::TerminalStatus(status),
                        other => other,
                    };
                    warn!(
                        url,
                        status = status.as_u16(),
                        reason = status.canonical_reason().unwrap_or(""),
                        "attempt {attempt}/{max_attempts} returned non-ok status"
                    );

                    if record.classification.is_retryable() && attempt < max_attempts {
                        let retry_after = response
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_owned);
                        let snippet =
                            read_snippet(response, &config, options, attempt, elapsed).await?;
                        warn!(url, status = status.as_u16(), body = %snippet, "response body");

                        let decision = RetryDecision::plan(
                            options,
                            attempt,
                            retry_after.as_deref(),
                            Utc::now(),
                        );
                        record.wait = Some((decision.wait, decision.source));
                        report.attempts.push(record);
                        wait_before_retry(&config, url, attempt, decision).await?;
                        attempt += 1;
                        continue;
                    }

                    report.attempts.push(record);
                    report.elapsed = call_started.elapsed();
                    return Ok((response, report));
                }
                Err(fault) => {
                    let kind = fault.kind();
                    record.classification = classify_fault(kind);
                    fault.log(url, attempt, max_attempts, options.timeout_ms, kind);

                    if record.classification.is_retryable() && attempt < max_attempts {
                        let decision = RetryDecision::plan(options, attempt, None, Utc::now());
                        record.wait = Some((decision.wait, decision.source));
                        report.attempts.push(record);
                        wait_before_retry(&config, url, attempt, decision).await?;
                        attempt += 1;
                        continue;
                    }

                    error!(
                        url,
                        kind = %kind,
                        "attempt {attempt}/{max_attempts} failed, not retrying"
                    );
                    return Err(fault.into_error(attempt, kind, options.timeout_ms));
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        config: &RequestConfig,
        options: &RequestOptions,
    ) -> std::result::Result<Response, Fault> {
        let mut request = self
            .http
            .request(config.method.clone(), url)
            .headers(config.headers.clone());
        if let Some(sequence) = config.sequence {
            request = request.query(&[("seq", sequence)]);
        }
        if let Some(body) = &config.body {
            request = request.body(body.clone());
        }

        // The timer lives in this select and is dropped with it on every path.
        tokio::select! {
            result = request.send() => result.map_err(Fault::Transport),
            () = sleep(Duration::from_millis(options.timeout_ms)) => Err(Fault::TimedOut),
            () = cancelled(config.cancel.as_ref()) => Err(Fault::Cancelled),
        }
    }
}

/// Reads a body snippet within what is left of the attempt's timeout.
///
/// Expiry yields a placeholder snippet; caller cancellation ends the call.
async fn read_snippet(
    response: Response,
    config: &RequestConfig,
    options: &RequestOptions,
    attempt: u32,
    elapsed: Duration,
) -> Result<String> {
    let remaining = Duration::from_millis(options.timeout_ms).saturating_sub(elapsed);

    tokio::select! {
        snippet = body_snippet(response) => Ok(snippet),
        () = sleep(remaining) => Ok(format!(
            "<body read timed out after {} ms>",
            options.timeout_ms
        )),
        () = cancelled(config.cancel.as_ref()) => Err(ExecutorError::Cancelled { attempt }),
    }
}

/// Sleeps for the planned wait, ending early if the caller cancels.
async fn wait_before_retry(
    config: &RequestConfig,
    url: &str,
    attempt: u32,
    decision: RetryDecision,
) -> Result<()> {
    debug!(
        url,
        wait_ms = u64::try_from(decision.wait.as_millis()).unwrap_or(u64::MAX),
        source = ?decision.source,
        "retrying after attempt {attempt}"
    );

    tokio::select! {
        () = sleep(decision.wait) => Ok(()),
        () = cancelled(config.cancel.as_ref()) => {
            warn!(url, "cancelled by caller while waiting to retry");
            Err(ExecutorError::Cancelled { attempt })
        }
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
