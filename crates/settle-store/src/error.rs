//! Error types for billing record storage.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures while reading or writing billing records.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Credential material is missing or malformed.
    #[error("invalid store credentials: {message}")]
    Credentials {
        /// What was wrong with the credentials
        message: String,
    },

    /// Exchanging the service-account assertion for an access token failed.
    #[error("store authentication failed: {message}")]
    Authentication {
        /// Token endpoint error message
        message: String,
        /// Token endpoint status, when it answered
        status_code: Option<u16>,
    },

    /// Connection to the store failed.
    #[error("store connection failed: {message}")]
    Network {
        /// Transport error message
        message: String,
    },

    /// Store answered with a non-2xx status.
    #[error("store request failed with status code {status_code}")]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Response body, parsed as JSON when possible
        body: serde_json::Value,
    },

    /// Store response did not have the expected shape.
    #[error("invalid store response: {message}")]
    InvalidResponse {
        /// Decoder error message
        message: String,
    },

    /// Test double was told to fail.
    #[error("injected store failure: {message}")]
    Injected {
        /// Failure description
        message: String,
    },
}

impl StoreError {
    /// Creates a credentials error.
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials { message: message.into() }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Authentication { message: message.into(), status_code }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates an error for a non-2xx response.
    pub fn http_status(status_code: u16, body: serde_json::Value) -> Self {
        Self::HttpStatus { status_code, body }
    }

    /// Creates a response decoding error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Upstream HTTP status, when the store or token endpoint answered.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status_code, .. } => Some(*status_code),
            Self::Authentication { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Upstream response body for non-2xx answers.
    pub fn upstream_body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Interprets a response body as JSON, falling back to a JSON string.
pub(crate) fn body_to_json(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
