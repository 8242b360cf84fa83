//! Oracle error taxonomy with retry classification.
//!
//! The transport layer reports an [`OracleErrorKind`]; the retry loop only
//! ever looks at the derived [`RetryCategory`], never at message strings.
//!
//! | Category    | Source                          | Backoff            |
//! |-------------|---------------------------------|--------------------|
//! | RateLimit   | HTTP 429                        | 15 s × attempt     |
//! | ServerError | HTTP ≥ 500                      | 10 s × attempt     |
//! | Timeout     | connect/read timeout            | 8 s × attempt      |
//! | Connection  | connect failure                 | 12 s × attempt     |
//! | Transient   | body/request/redirect/builder   | 10 s × attempt     |
//! | Permissive  | other status, malformed body    | 5 s fixed          |
//!
//! Every category is retried until the attempt budget runs out.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// What went wrong on one oracle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    RateLimited,
    Server(u16),
    /// Non-2xx status other than 429 and 5xx.
    Status(u16),
    Timeout,
    Connect,
    /// Request or body transport failure (reset, TLS, redirect loop, client setup).
    Transport,
    /// 2xx with an unusable body.
    Malformed,
}

impl OracleErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            s if s >= 500 => Self::Server(s),
            s => Self::Status(s),
        }
    }

    pub fn retry_category(self) -> RetryCategory {
        match self {
            Self::RateLimited => RetryCategory::RateLimit,
            Self::Server(_) => RetryCategory::ServerError,
            Self::Timeout => RetryCategory::Timeout,
            Self::Connect => RetryCategory::Connection,
            Self::Transport => RetryCategory::Transient,
            Self::Status(_) | Self::Malformed => RetryCategory::Permissive,
        }
    }
}

impl fmt::Display for OracleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Server(s) => write!(f, "server error {s}"),
            Self::Status(s) => write!(f, "HTTP {s}"),
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connection error"),
            Self::Transport => write!(f, "transport error"),
            Self::Malformed => write!(f, "malformed response"),
        }
    }
}

/// Classification used by the retry loop to pick a backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    RateLimit,
    ServerError,
    Timeout,
    Connection,
    Transient,
    /// Not known to be transient; retried anyway after a short fixed pause.
    Permissive,
}

impl RetryCategory {
    /// Pause before the next attempt. `attempt` is 1-based.
    pub fn backoff(self, attempt: u32) -> Duration {
        let scaled = |secs: u64| Duration::from_secs(secs * u64::from(attempt.max(1)));
        match self {
            Self::RateLimit => scaled(15),
            Self::ServerError => scaled(10),
            Self::Timeout => scaled(8),
            Self::Connection => scaled(12),
            Self::Transient => scaled(10),
            Self::Permissive => Duration::from_secs(5),
        }
    }

    /// True for failures known to clear up on their own.
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Permissive)
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimit => write!(f, "rate_limit"),
            Self::ServerError => write!(f, "server_error"),
            Self::Timeout => write!(f, "timeout"),
            Self::Connection => write!(f, "connection"),
            Self::Transient => write!(f, "transient"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

/// A failed oracle attempt.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct OracleError {
    pub kind: OracleErrorKind,
    pub message: String,
}

impl OracleError {
    pub fn new(kind: OracleErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn retry_category(&self) -> RetryCategory {
        self.kind.retry_category()
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            OracleErrorKind::Timeout
        } else if e.is_connect() {
            OracleErrorKind::Connect
        } else if e.is_decode() {
            OracleErrorKind::Malformed
        } else if e.is_status() {
            e.status()
                .map(|s| OracleErrorKind::from_status(s.as_u16()))
                .unwrap_or(OracleErrorKind::Transport)
        } else {
            // is_body, is_request, is_redirect, is_builder and anything newer.
            OracleErrorKind::Transport
        };
        Self::new(kind, e.to_string())
    }
}
