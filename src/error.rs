//! Error types for the Mayl client and dispatcher.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`Client`](crate::Client) calls and by the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure, timeout, or an error building the HTTP client.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API key was missing, invalid, or lacks permission.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The request was rejected as invalid, either locally or by the API.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was wrong.
        message: String,
        /// The offending field, when known.
        field: Option<String>,
    },

    /// The API signalled quota exhaustion (HTTP 429).
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Message returned by the API.
        message: String,
        /// How long the API asked callers to wait before trying again.
        retry_after: Option<Duration>,
    },

    /// Any other non-success response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message returned by the API.
        message: String,
        /// Server-side request identifier for support lookups.
        request_id: Option<String>,
    },

    /// No API key was configured.
    #[error("Missing API key: set MAYLNG_API_KEY or call ClientBuilder::api_key")]
    MissingApiKey,

    /// The configured base URL is not an absolute http(s)-style URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A dispatcher was asked to use a batch size of zero.
    #[error("Invalid batch size {0}: must be at least 1")]
    InvalidBatchSize(usize),
}

impl Error {
    /// Build a validation error for a specific field.
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Classify this error for dispatch outcomes.
    ///
    /// Rate limits are [`ErrorKind::RateLimited`]. Anything the API refused on
    /// content or credentials is [`ErrorKind::Rejected`]; transport failures,
    /// server errors and undecodable responses are [`ErrorKind::Transient`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Authentication(_)
            | Self::Validation { .. }
            | Self::MissingApiKey
            | Self::InvalidBaseUrl(_)
            | Self::InvalidBatchSize(_) => ErrorKind::Rejected,
            Self::Api { status, .. } if (400..500).contains(status) => ErrorKind::Rejected,
            Self::Api { .. } | Self::Request(_) | Self::Json(_) => ErrorKind::Transient,
        }
    }

    /// The retry-after hint carried by a rate-limit error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns `true` if this is a rate-limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Coarse classification of a failed send, as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The service asked callers to slow down.
    RateLimited,
    /// The service refused the request content or credentials.
    Rejected,
    /// Network, timeout, or server-side failure.
    Transient,
    /// The request was never issued because the dispatch was cancelled.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_kind_and_hint() {
        let err = Error::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_client_errors_are_rejected() {
        let err = Error::validation("to", "at least one recipient is required");
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(err.retry_after(), None);

        let err = Error::Api {
            status: 404,
            message: "not found".into(),
            request_id: None,
        };
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(Error::Authentication("bad key".into()).kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = Error::Api {
            status: 503,
            message: "unavailable".into(),
            request_id: Some("req_1".into()),
        };
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_json_errors_are_transient() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
