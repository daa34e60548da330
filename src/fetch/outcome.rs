//! Classification of single attempts

use super::error::{TransportError, TransportErrorKind};
use super::transport::FetchResponse;
use reqwest::StatusCode;

/// Statuses that indicate a blocked, throttled or broken route rather than a
/// definitive answer. Redirects are included: through an untrusted proxy they
/// usually mean the request was intercepted.
pub const RETRYABLE_STATUSES: [u16; 10] = [301, 302, 401, 403, 407, 429, 500, 502, 503, 504];

pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// What happened on one attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(FetchResponse),
    RetryableStatus(StatusCode),
    TransientError(TransportErrorKind),
}

impl AttemptOutcome {
    pub fn classify(result: Result<FetchResponse, TransportError>) -> Self {
        match result {
            Ok(response) if is_retryable_status(response.status) => {
                Self::RetryableStatus(response.status)
            }
            Ok(response) => Self::Success(response),
            Err(e) => Self::TransientError(e.kind),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
