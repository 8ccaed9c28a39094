//! Error classification for provider gateways.
//!
//! Every gateway maps vendor failures into a [`GatewayError`] with an
//! [`ErrorKind`] so the retry harness and the router can decide whether a
//! failure is worth retrying or should skip straight to the next provider.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Classified failure categories for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or rejected credentials (HTTP 401/403). Never retried.
    Auth,
    /// Vendor-side throttling (HTTP 429). Retryable; may carry a
    /// `Retry-After` delay.
    RateLimit,
    /// Vendor 5xx, connection failures, DNS failures. Retryable.
    ServiceError,
    /// Our own per-attempt timeout fired. Retryable.
    Timeout,
    /// The vendor responded but nothing could be identified. Terminal.
    NoMatch,
    /// The vendor payload could not be parsed into the expected shape.
    /// Terminal.
    InvalidResponse,
    /// Local misconfiguration (missing key, bad URL). Terminal.
    Configuration,
    /// The caller cancelled the operation. Terminal.
    Cancelled,
}

impl ErrorKind {
    /// Whether the retry harness should attempt the operation again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::ServiceError | ErrorKind::Timeout
        )
    }

    /// Stable machine code, recorded in the usage ledger.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Auth => "AUTH",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::ServiceError => "SERVICE_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NoMatch => "NO_MATCH",
            ErrorKind::InvalidResponse => "INVALID_RESPONSE",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Cancelled => "CANCELLED",
        }
    }
}

/// A classified provider failure.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", kind.code())]
pub struct GatewayError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable detail. Never contains API keys.
    pub message: String,
    /// Vendor-requested delay before the next attempt, when provided.
    pub retry_after: Option<Duration>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: ErrorKind::RateLimit,
            message: message.into(),
            retry_after,
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn no_match(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoMatch, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    /// Whether the retry harness should attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Stable machine code, recorded in the usage ledger.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Classify an HTTP error status the way every gateway does.
    ///
    /// `body` is the (possibly empty) response text, used only for the
    /// message and for the "invalid api key" signature some vendors return
    /// with a 400.
    pub fn from_status(status: StatusCode, body: &str, retry_after: Option<Duration>) -> Self {
        let detail = if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), truncate(body, 300))
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Self::auth(detail);
        }
        if body.to_lowercase().contains("invalid api key") {
            return Self::auth(detail);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Self::rate_limit(detail, retry_after);
        }
        if status.is_server_error() {
            return Self::service(detail);
        }
        Self::invalid_response(detail)
    }

    /// Classify a transport-level reqwest error.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::service(format!("connection failed: {}", err))
        } else {
            Self::service(format!("transport error: {}", err))
        }
    }
}

/// Parse a `Retry-After` header value (delta-seconds form only).
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Pull a `Retry-After` delay out of response headers.
pub fn retry_after_from_headers(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    parse_retry_after(
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok()),
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(ErrorKind::ServiceError.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::NoMatch.is_retryable());
        assert!(!ErrorKind::InvalidResponse.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_classify_auth_statuses() {
        let err = GatewayError::from_status(StatusCode::UNAUTHORIZED, "", None);
        assert_eq!(err.kind, ErrorKind::Auth);

        let err = GatewayError::from_status(StatusCode::FORBIDDEN, "denied", None);
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[test]
    fn test_classify_invalid_api_key_signature() {
        // Some vendors return 400 with an auth failure in the body.
        let err = GatewayError::from_status(StatusCode::BAD_REQUEST, "Invalid API key provided", None);
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[test]
    fn test_classify_rate_limit_with_retry_after() {
        let err = GatewayError::from_status(
            StatusCode::TOO_MANY_REQUESTS,
            "slow down",
            Some(Duration::from_secs(7)),
        );
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_classify_server_errors() {
        for status in [502u16, 500, 503] {
            let err = GatewayError::from_status(StatusCode::from_u16(status).unwrap(), "", None);
            assert_eq!(err.kind, ErrorKind::ServiceError, "status {}", status);
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_classify_other_client_errors_terminal() {
        let err = GatewayError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad input", None);
        assert_eq!(err.kind, ErrorKind::InvalidResponse);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("12")), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(Some(" 3 ")), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_display_uses_code() {
        let err = GatewayError::timeout("took too long");
        assert_eq!(err.to_string(), "TIMEOUT: took too long");
    }
}
