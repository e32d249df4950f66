use std::time::Duration;

/// Errors from an external-service adapter.
///
/// The pipeline treats the variants differently: a `Rejected` call moves
/// the prospect to `FAILED`, anything else leaves it where it was so the
/// next job picks it up again.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{service} timed out after {after:?}")]
    Timeout {
        service: &'static str,
        after: Duration,
    },

    /// Network failure, 5xx, throttling, or an unreadable response.
    #[error("{service} unavailable: {message}")]
    Transient {
        service: &'static str,
        message: String,
    },

    /// The service answered with a definitive refusal (4xx).
    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },
}

impl AdapterError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, AdapterError::Rejected { .. })
    }

    /// Classify a non-success HTTP status.
    ///
    /// 408 and 429 are retryable even though they are 4xx.
    pub fn from_status(service: &'static str, status: u16, body: String) -> Self {
        match status {
            408 | 429 => AdapterError::Transient {
                service,
                message: format!("HTTP {status}: {body}"),
            },
            400..=499 => AdapterError::Rejected {
                service,
                status,
                message: body,
            },
            _ => AdapterError::Transient {
                service,
                message: format!("HTTP {status}: {body}"),
            },
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error, after: Duration) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout { service, after }
        } else {
            AdapterError::Transient {
                service,
                message: err.to_string(),
            }
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
