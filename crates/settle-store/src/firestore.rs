//! Firestore REST implementation of [`BillingStore`].
//!
//! Uses two endpoints of the v1 API:
//! - `documents:runQuery` with an equality filter and `limit: 1`
//! - `documents:commit` with a masked update, a `REQUEST_TIME` transform for
//!   `updatedAt` and an `exists` precondition, so a record deleted between
//!   lookup and write is never recreated

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use settle_core::{BillingRecord, Clock, PaymentId, RecordKey, StatusUpdate};
use tracing::{debug, info_span, Instrument};

use crate::{
    credentials::Credentials,
    error::{body_to_json, Result, StoreError},
    token::TokenSource,
    BillingStore, StoreFuture,
};

/// Production Firestore REST endpoint.
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Collection holding billing records.
pub const DEFAULT_COLLECTION: &str = "faturamento";

/// Field names on billing documents.
pub mod fields {
    /// Foreign key to the Asaas payment.
    pub const ASAAS_PAYMENT_ID: &str = "asaasPaymentId";
    /// Domain status label.
    pub const STATUS: &str = "status";
    /// Verbatim provider status.
    pub const ASAAS_RAW_STATUS: &str = "asaasRawStatus";
    /// Server timestamp of the last reconciliation.
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Connection settings for the Firestore store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    /// REST base URL; `None` picks production or the emulator from the
    /// credentials.
    pub base_url: Option<String>,
    /// Billing collection id.
    pub collection: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            collection: DEFAULT_COLLECTION.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Billing store backed by Firestore.
///
/// Built once per process; the HTTP connection pool and the access-token
/// cache live for the lifetime of the value.
#[derive(Debug)]
pub struct FirestoreStore {
    http: reqwest::Client,
    tokens: TokenSource,
    documents_url: String,
    collection: String,
}

impl FirestoreStore {
    /// Creates a store for the given credentials.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Credentials` if the key material is unusable and
    /// `StoreError::Network` if the HTTP client cannot be built.
    pub fn new(config: FirestoreConfig, credentials: &Credentials, clock: Arc<dyn Clock>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("settle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::network(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.unwrap_or_else(|| match credentials {
            Credentials::Emulator { host, .. } => format!("http://{host}/v1"),
            Credentials::ServiceAccount(_) => DEFAULT_FIRESTORE_URL.to_string(),
        });
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            base_url.trim_end_matches('/'),
            credentials.project_id()
        );

        let tokens = TokenSource::new(credentials, http.clone(), clock)?;

        Ok(Self { http, tokens, documents_url, collection: config.collection })
    }

    /// Resource path prefix for documents in this project.
    pub fn documents_url(&self) -> &str {
        &self.documents_url
    }

    async fn post(&self, url: String, body: &Value) -> Result<Value> {
        let token = self.tokens.bearer().await?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::network(e.to_string()))?;

        let status = response.status();
        let bytes =
            response.bytes().await.map_err(|e| StoreError::network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), url = %url, "Firestore returned an error response");
            return Err(StoreError::http_status(status.as_u16(), body_to_json(&bytes)));
        }

        serde_json::from_slice(&bytes).map_err(|e| StoreError::invalid_response(e.to_string()))
    }

    async fn run_query(&self, payment_id: &PaymentId) -> Result<Option<BillingRecord>> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": fields::ASAAS_PAYMENT_ID },
                        "op": "EQUAL",
                        "value": { "stringValue": payment_id.as_str() }
                    }
                },
                "limit": 1
            }
        });

        let rows = self.post(format!("{}:runQuery", self.documents_url), &query).await?;
        let rows: Vec<QueryRow> =
            serde_json::from_value(rows).map_err(|e| StoreError::invalid_response(e.to_string()))?;

        let Some(document) = rows.into_iter().find_map(|row| row.document) else {
            debug!("No billing record matched");
            return Ok(None);
        };

        document.into_record(payment_id).map(Some)
    }

    async fn commit_update(&self, key: &RecordKey, update: &StatusUpdate) -> Result<()> {
        let commit = json!({
            "writes": [{
                "update": {
                    "name": key.0,
                    "fields": {
                        "status": { "stringValue": update.status().as_str() },
                        "asaasRawStatus": { "stringValue": update.raw_status() }
                    }
                },
                "updateMask": { "fieldPaths": [fields::STATUS, fields::ASAAS_RAW_STATUS] },
                "updateTransforms": [{
                    "fieldPath": fields::UPDATED_AT,
                    "setToServerValue": "REQUEST_TIME"
                }],
                "currentDocument": { "exists": true }
            }]
        });

        let response = self.post(format!("{}:commit", self.documents_url), &commit).await?;
        let commit_time = response.get("commitTime").and_then(Value::as_str);
        debug!(commit_time, "Billing record updated");
        Ok(())
    }
}

impl BillingStore for FirestoreStore {
    fn find_by_payment_id<'a>(
        &'a self,
        payment_id: &'a PaymentId,
    ) -> StoreFuture<'a, Option<BillingRecord>> {
        let span = info_span!("firestore_find", collection = %self.collection, payment_id = %payment_id);
        Box::pin(self.run_query(payment_id).instrument(span))
    }

    fn apply_status<'a>(&'a self, key: &'a RecordKey, update: &'a StatusUpdate) -> StoreFuture<'a, ()> {
        let span = info_span!("firestore_update", document = %key, status = %update.status());
        Box::pin(self.commit_update(key, update).instrument(span))
    }
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

impl Document {
    fn into_record(self, queried: &PaymentId) -> Result<BillingRecord> {
        let string_field = |name: &str| {
            self.fields.get(name).and_then(|v| v.get("stringValue")).and_then(Value::as_str).map(str::to_string)
        };

        let asaas_payment_id = match string_field(fields::ASAAS_PAYMENT_ID) {
            Some(id) => PaymentId::new(id).map_err(|e| StoreError::invalid_response(e.to_string()))?,
            None => queried.clone(),
        };

        let updated_at = self
            .fields
            .get(fields::UPDATED_AT)
            .and_then(|v| v.get("timestampValue"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(BillingRecord {
            asaas_payment_id,
            status: string_field(fields::STATUS),
            asaas_raw_status: string_field(fields::ASAAS_RAW_STATUS),
            updated_at,
            key: RecordKey(self.name),
        })
    }
}
