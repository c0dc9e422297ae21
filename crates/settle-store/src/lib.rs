//! Billing record storage.
//!
//! Defines the [`BillingStore`] seam used by the reconciler, the Firestore
//! REST implementation used in production and an in-memory implementation
//! for tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{future::Future, pin::Pin};

use settle_core::{BillingRecord, PaymentId, RecordKey, StatusUpdate};

pub mod credentials;
pub mod error;
pub mod firestore;
pub mod memory;
pub mod token;

pub use credentials::{normalize_private_key, Credentials, ServiceAccount, DEFAULT_TOKEN_URI};
pub use error::{Result, StoreError};
pub use firestore::{FirestoreConfig, FirestoreStore, DEFAULT_COLLECTION, DEFAULT_FIRESTORE_URL};
pub use memory::MemoryStore;
pub use token::{AssertionClaims, TokenSource, DATASTORE_SCOPE, REFRESH_MARGIN_SECS};

/// Boxed future returned by [`BillingStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Reads and updates billing records keyed by provider payment id.
pub trait BillingStore: Send + Sync + 'static {
    /// Returns the first record whose `asaasPaymentId` equals `payment_id`.
    ///
    /// Which record is "first" when several match is unspecified.
    fn find_by_payment_id<'a>(
        &'a self,
        payment_id: &'a PaymentId,
    ) -> StoreFuture<'a, Option<BillingRecord>>;

    /// Writes `status`, `asaasRawStatus` and a server-side `updatedAt` to an
    /// existing record. Other fields are left untouched.
    fn apply_status<'a>(&'a self, key: &'a RecordKey, update: &'a StatusUpdate) -> StoreFuture<'a, ()>;
}
