//! Payment reconciliation.
//!
//! The webhook payload is only a trigger: the status written to the billing
//! record always comes from a fresh read of the payment at Asaas.

use std::{fmt, sync::Arc};

use settle_asaas::AsaasClient;
use settle_core::{PaymentId, StatusUpdate};
use settle_store::BillingStore;
use tracing::{debug, info};

use crate::error::ReconcileError;

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No billing record references the payment.
    NoRecord,
    /// The record was updated with these values.
    Updated(StatusUpdate),
}

/// Looks up a payment at Asaas and writes its status to the billing store.
#[derive(Clone)]
pub struct Reconciler {
    provider: AsaasClient,
    store: Arc<dyn BillingStore>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler").field("provider", &self.provider).finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler over the given provider client and store.
    pub fn new(provider: AsaasClient, store: Arc<dyn BillingStore>) -> Self {
        Self { provider, store }
    }

    /// Re-reads the payment, maps its status and updates the first billing
    /// record referencing it.
    ///
    /// No retries: a failed provider call leaves the store untouched, and a
    /// failed update is reported as is.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Provider` if the payment cannot be fetched
    /// and `ReconcileError::Store` if the lookup or update fails.
    pub async fn reconcile(&self, payment_id: &PaymentId) -> Result<Outcome, ReconcileError> {
        let payment = self.provider.get_payment(payment_id).await?;
        let update = StatusUpdate::from_provider(payment.status());
        debug!(
            asaas_status = update.raw_status(),
            status = %update.status(),
            "Mapped provider status"
        );

        let Some(record) = self.store.find_by_payment_id(payment_id).await? else {
            return Ok(Outcome::NoRecord);
        };

        self.store.apply_status(&record.key, &update).await?;
        info!(
            record = %record.key,
            previous_status = record.status.as_deref().unwrap_or("<unset>"),
            status = %update.status(),
            asaas_status = update.raw_status(),
            "Billing record reconciled"
        );

        Ok(Outcome::Updated(update))
    }
}
