//! Resilient outbound fetching through untrusted proxies
//!
//! [`Fetcher`] is the single retry boundary: callers get either a response
//! with a non-retryable status or a terminal [`FetchError`]. They should not
//! add retries of their own.

mod error;
mod orchestrator;
mod outcome;
mod transport;

pub use error::{FetchError, Result, TransportError, TransportErrorKind};
pub use orchestrator::{
    AttemptObserver, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_JITTER,
    DEFAULT_READ_TIMEOUT, DEFAULT_USER_AGENTS, FetchOptions, Fetcher, jitter,
};
pub use outcome::{AttemptOutcome, RETRYABLE_STATUSES, is_retryable_status};
pub use transport::{
    AttemptRequest, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_MAX_IDLE_PER_HOST, FetchResponse,
    HttpTransport, Transport, TransportConfig,
};
