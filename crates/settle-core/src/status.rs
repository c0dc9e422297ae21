//! Provider status vocabulary and its translation into domain labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status reported by Asaas when the payment payload omits one.
pub const DEFAULT_PROVIDER_STATUS: &str = "PENDING";

/// Every provider status code with an explicit mapping.
pub const KNOWN_PROVIDER_STATUSES: [&str; 8] = [
    "PENDING",
    "AWAITING_PAYMENT",
    "RECEIVED",
    "CONFIRMED",
    "OVERDUE",
    "EXPIRED",
    "CANCELLED",
    "REFUNDED",
];

/// Billing status label stored on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// Awaiting payment.
    #[default]
    Open,
    /// Paid and confirmed.
    Settled,
    /// Past the due date without payment.
    Overdue,
    /// No longer payable.
    Expired,
    /// Cancelled or refunded.
    Cancelled,
}

impl DomainStatus {
    /// All labels, in declaration order.
    pub const ALL: [Self; 5] =
        [Self::Open, Self::Settled, Self::Overdue, Self::Expired, Self::Cancelled];

    /// Returns the label as written to the store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Settled => "settled",
            Self::Overdue => "overdue",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an Asaas payment status to the billing record label.
///
/// Total over all strings: unknown, empty or differently-cased codes fall
/// back to [`DomainStatus::Open`].
pub fn map_provider_status(raw: &str) -> DomainStatus {
    match raw {
        "PENDING" | "AWAITING_PAYMENT" => DomainStatus::Open,
        "RECEIVED" | "CONFIRMED" => DomainStatus::Settled,
        "OVERDUE" => DomainStatus::Overdue,
        "EXPIRED" => DomainStatus::Expired,
        "CANCELLED" | "REFUNDED" => DomainStatus::Cancelled,
        _ => DomainStatus::Open,
    }
}
