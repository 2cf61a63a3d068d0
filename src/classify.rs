//! Outcome classification for one attempt.
//!
//! Both entry points are pure: the same status or fault kind always yields the
//! same [`Classification`].

use std::{error::Error as StdError, fmt, io};

use reqwest::StatusCode;

/// Transport-level fault descriptor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FaultKind {
    ConnectionReset,
    TimedOut,
    /// Resolver asked us to try again later.
    NameResolutionRetry,
    NameNotFound,
    BrokenPipe,
    ConnectionRefused,
    /// Generic failure while sending the request (includes connect errors).
    Request,
    /// The per-attempt timer cancelled the request.
    Aborted,
    /// The caller-supplied cancellation token fired.
    Cancelled,
    Builder,
    Redirect,
    Decode,
    Body,
    Other,
}

impl FaultKind {
    /// Derives the fault kind of a `reqwest` error.
    ///
    /// The source chain is searched first so that socket-level causes win
    /// over reqwest's coarser categories.
    pub fn of(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::TimedOut;
        }
        if let Some(kind) = Self::from_source_chain(err) {
            return kind;
        }
        if err.is_builder() {
            Self::Builder
        } else if err.is_redirect() {
            Self::Redirect
        } else if err.is_decode() {
            Self::Decode
        } else if err.is_body() {
            Self::Body
        } else if err.is_request() || err.is_connect() {
            Self::Request
        } else {
            Self::Other
        }
    }

    fn from_source_chain(err: &(dyn StdError + 'static)) -> Option<Self> {
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionReset => return Some(Self::ConnectionReset),
                    io::ErrorKind::TimedOut => return Some(Self::TimedOut),
                    io::ErrorKind::BrokenPipe => return Some(Self::BrokenPipe),
                    io::ErrorKind::ConnectionRefused => return Some(Self::ConnectionRefused),
                    _ => {}
                }
            }
            if let Some(kind) = Self::from_resolver_message(&cause.to_string()) {
                return Some(kind);
            }
            source = cause.source();
        }
        None
    }

    // getaddrinfo failures only surface as text through hyper-util.
    fn from_resolver_message(message: &str) -> Option<Self> {
        let message = message.to_ascii_lowercase();
        if message.contains("temporary failure in name resolution") {
            Some(Self::NameResolutionRetry)
        } else if message.contains("failed to lookup address")
            || message.contains("name or service not known")
            || message.contains("nodename nor servname")
        {
            Some(Self::NameNotFound)
        } else {
            None
        }
    }

    /// Whether a fault of this kind is expected to clear on retry.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::ConnectionReset
                | Self::TimedOut
                | Self::NameResolutionRetry
                | Self::NameNotFound
                | Self::BrokenPipe
                | Self::ConnectionRefused
                | Self::Request
                | Self::Aborted
        )
    }

    /// Short name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionReset => "connection-reset",
            Self::TimedOut => "timed-out",
            Self::NameResolutionRetry => "name-resolution-retry",
            Self::NameNotFound => "name-not-found",
            Self::BrokenPipe => "broken-pipe",
            Self::ConnectionRefused => "connection-refused",
            Self::Request => "request-error",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
            Self::Builder => "builder",
            Self::Redirect => "redirect",
            Self::Decode => "decode",
            Self::Body => "body",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified outcome of one attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Classification {
    Success,
    /// 429 or 5xx: eligible for another attempt.
    RetryableStatus(StatusCode),
    /// Any other non-ok status: returned to the caller as-is.
    TerminalStatus(StatusCode),
    TransientError(FaultKind),
    FatalError(FaultKind),
    /// The per-attempt timer fired.
    Timeout,
}

impl Classification {
    /// Whether the outcome allows another attempt when budget remains.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RetryableStatus(_) | Self::TransientError(_) | Self::Timeout
        )
    }
}

/// Classifies an HTTP status. 2xx is `Success`.
pub fn classify_status(status: StatusCode) -> Classification {
    if status.is_success() {
        Classification::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Classification::RetryableStatus(status)
    } else {
        Classification::TerminalStatus(status)
    }
}

/// Classifies a transport fault.
pub fn classify_fault(kind: FaultKind) -> Classification {
    match kind {
        FaultKind::Aborted => Classification::Timeout,
        kind if kind.is_transient() => Classification::TransientError(kind),
        kind => Classification::FatalError(kind),
    }
}
