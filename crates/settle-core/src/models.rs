//! Billing record and payment identifier types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, Result},
    status::{map_provider_status, DomainStatus, DEFAULT_PROVIDER_STATUS},
};

/// Asaas payment identifier, e.g. `pay_080225913252`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Creates a payment id, rejecting empty or whitespace-only input.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidPaymentId(id));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for PaymentId {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Store-assigned key of a billing record.
///
/// For Firestore this is the full document resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub String);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A billing record as read from the `faturamento` collection.
///
/// Only the fields this service reads or writes are modelled; `status` and
/// `asaas_raw_status` are optional because records created upstream may not
/// have been reconciled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingRecord {
    /// Store key.
    pub key: RecordKey,
    /// Foreign key to the provider payment.
    pub asaas_payment_id: PaymentId,
    /// Domain label as currently stored.
    pub status: Option<String>,
    /// Provider status as currently stored.
    pub asaas_raw_status: Option<String>,
    /// Server time of the last reconciliation.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field values written by a reconciliation.
///
/// Built only from a raw provider status, so the stored label can never
/// disagree with the stored raw status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    status: DomainStatus,
    raw_status: String,
}

impl StatusUpdate {
    /// Derives the update from the provider's status field.
    ///
    /// A missing or empty status is treated as `PENDING`.
    pub fn from_provider(raw_status: Option<&str>) -> Self {
        let raw_status = match raw_status {
            Some(raw) if !raw.is_empty() => raw,
            _ => DEFAULT_PROVIDER_STATUS,
        };

        Self { status: map_provider_status(raw_status), raw_status: raw_status.to_string() }
    }

    /// Domain label to store.
    pub fn status(&self) -> DomainStatus {
        self.status
    }

    /// Verbatim provider status to store.
    pub fn raw_status(&self) -> &str {
        &self.raw_status
    }
}
