use crate::pool::PoolStats;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Terminal failures of a fetch call.
///
/// Per-proxy failures never surface here; they are retried with another
/// proxy until the attempt budget runs out.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No proxies available")]
    NoProxiesAvailable,

    #[error("Failed after {attempts} attempts ({stats})")]
    Exhausted { attempts: u32, stats: PoolStats },

    #[error("HTTP {status} for {url}")]
    Status { status: StatusCode, url: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Kind of transport-level failure for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// TCP, TLS or proxy handshake failure
    Connect,
    Timeout,
    /// Failure while reading the response body
    Body,
    /// The proxy address cannot be turned into a proxy URL
    InvalidProxy,
    Request,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Body => "body",
            Self::InvalidProxy => "invalid_proxy",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one attempt through one proxy.
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };
        Self::new(kind, e.to_string())
    }
}
