//! Asaas payments API client.
//!
//! Used by the webhook handler to re-confirm a payment's status instead of
//! trusting the webhook payload.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{AsaasClient, ClientConfig, Payment, DEFAULT_BASE_URL};
pub use error::{ErrorCategory, ProviderError, Result};
