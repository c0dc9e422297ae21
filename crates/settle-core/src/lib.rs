//! Core domain types for payment-status reconciliation.
//!
//! Holds the provider-to-domain status mapping, the billing record model and
//! the clock abstraction shared by the store and API crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod status;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{BillingRecord, PaymentId, RecordKey, StatusUpdate};
pub use status::{map_provider_status, DomainStatus, DEFAULT_PROVIDER_STATUS, KNOWN_PROVIDER_STATUSES};
pub use time::{Clock, RealClock, TestClock};
