//! Error types for Asaas API calls.
//!
//! Each variant keeps enough context (upstream status, upstream body) for the
//! webhook handler to echo a useful diagnostic back to the caller.

use std::fmt;

use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Failures while fetching a payment from Asaas.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection could not be established or was dropped.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Underlying transport error message
        message: String,
    },

    /// Request exceeded the configured timeout.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout that was exceeded, in milliseconds
        timeout_ms: u64,
    },

    /// Asaas answered with a non-2xx status.
    #[error("Request failed with status code {status_code}")]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Response body, parsed as JSON when possible
        body: serde_json::Value,
    },

    /// Response body was not the expected JSON shape.
    #[error("invalid response body: {message}")]
    InvalidResponse {
        /// Decoder error message
        message: String,
    },

    /// Client could not be built from configuration.
    #[error("invalid client configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },
}

impl ProviderError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Creates an error for a non-2xx response.
    pub fn http_status(status_code: u16, body: serde_json::Value) -> Self {
        Self::HttpStatus { status_code, body }
    }

    /// Creates a response decoding error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Upstream HTTP status, when Asaas answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Upstream response body, when Asaas answered with an error.
    pub fn upstream_body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Coarse category used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport failures and timeouts.
    Network,
    /// 4xx responses, usually a bad API key or unknown payment.
    Client,
    /// 5xx responses.
    Server,
    /// Unparseable responses.
    Decode,
    /// Local misconfiguration.
    Configuration,
}

impl From<&ProviderError> for ErrorCategory {
    fn from(error: &ProviderError) -> Self {
        match error {
            ProviderError::NetworkError { .. } | ProviderError::Timeout { .. } => Self::Network,
            ProviderError::HttpStatus { status_code, .. } if *status_code >= 500 => Self::Server,
            ProviderError::HttpStatus { .. } => Self::Client,
            ProviderError::InvalidResponse { .. } => Self::Decode,
            ProviderError::ConfigurationError { .. } => Self::Configuration,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::Decode => write!(f, "decode"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn upstream_details_only_for_http_errors() {
        let error = ProviderError::http_status(404, json!({"errors": [{"code": "invalid_id"}]}));
        assert_eq!(error.upstream_status(), Some(404));
        assert_eq!(error.upstream_body().unwrap()["errors"][0]["code"], "invalid_id");

        let error = ProviderError::timeout(15_000);
        assert_eq!(error.upstream_status(), None);
        assert!(error.upstream_body().is_none());
    }

    #[test]
    fn error_categories_mapped_correctly() {
        assert_eq!(ErrorCategory::from(&ProviderError::network("refused")), ErrorCategory::Network);
        assert_eq!(ErrorCategory::from(&ProviderError::timeout(10)), ErrorCategory::Network);
        assert_eq!(
            ErrorCategory::from(&ProviderError::http_status(401, json!(null))),
            ErrorCategory::Client
        );
        assert_eq!(
            ErrorCategory::from(&ProviderError::http_status(503, json!(null))),
            ErrorCategory::Server
        );
    }

    #[test]
    fn error_display_format() {
        assert_eq!(ProviderError::timeout(15_000).to_string(), "request timeout after 15000ms");
        assert_eq!(
            ProviderError::http_status(401, json!({})).to_string(),
            "Request failed with status code 401"
        );
    }
}
