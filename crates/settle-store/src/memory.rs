//! In-memory billing store for tests.
//!
//! Behaves like the Firestore store: lookups return the first record in
//! insertion order, updates stamp `updated_at` from the injected clock, and
//! updates of unknown keys fail like a failed `exists` precondition. Counts
//! calls so tests can assert that rejected requests never touch storage.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use serde_json::json;
use settle_core::{BillingRecord, Clock, PaymentId, RecordKey, StatusUpdate};
use tokio::sync::RwLock;

use crate::{
    error::{Result, StoreError},
    BillingStore, StoreFuture,
};

/// Billing store held in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<Vec<BillingRecord>>,
    clock: Arc<dyn Clock>,
    find_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_finds: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store stamping updates with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            clock,
            find_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            fail_finds: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Adds a record.
    pub async fn insert(&self, record: BillingRecord) {
        self.records.write().await.push(record);
    }

    /// Returns a record by key.
    pub async fn get(&self, key: &RecordKey) -> Option<BillingRecord> {
        self.records.read().await.iter().find(|r| &r.key == key).cloned()
    }

    /// Returns every record in insertion order.
    pub async fn records(&self) -> Vec<BillingRecord> {
        self.records.read().await.clone()
    }

    /// Number of lookups performed.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Number of update attempts performed.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Makes subsequent lookups fail.
    pub fn fail_finds(&self, fail: bool) {
        self.fail_finds.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent updates fail.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    async fn find(&self, payment_id: &PaymentId) -> Result<Option<BillingRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(StoreError::Injected { message: "lookup failed".to_string() });
        }

        Ok(self.records.read().await.iter().find(|r| &r.asaas_payment_id == payment_id).cloned())
    }

    async fn update(&self, key: &RecordKey, update: &StatusUpdate) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Injected { message: "update failed".to_string() });
        }

        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| &r.key == key) else {
            return Err(StoreError::http_status(
                404,
                json!({ "error": { "code": 404, "status": "NOT_FOUND", "message": format!("No document to update: {key}") } }),
            ));
        };

        record.status = Some(update.status().as_str().to_string());
        record.asaas_raw_status = Some(update.raw_status().to_string());
        record.updated_at = Some(self.clock.now_utc());
        Ok(())
    }
}

impl BillingStore for MemoryStore {
    fn find_by_payment_id<'a>(
        &'a self,
        payment_id: &'a PaymentId,
    ) -> StoreFuture<'a, Option<BillingRecord>> {
        Box::pin(self.find(payment_id))
    }

    fn apply_status<'a>(&'a self, key: &'a RecordKey, update: &'a StatusUpdate) -> StoreFuture<'a, ()> {
        Box::pin(self.update(key, update))
    }
}
