//! Error types for domain value construction.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building domain values from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Payment identifier was empty.
    #[error("invalid payment id: {0:?}")]
    InvalidPaymentId(String),
}
