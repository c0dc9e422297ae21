//! HTTP client for the Asaas payments API.
//!
//! Only one call is needed: fetching a payment by id to read its
//! authoritative status. Transport failures, timeouts and non-2xx answers are
//! categorised so the webhook handler can report them.

use std::{fmt, time::Duration};

use reqwest::{header, Url};
use serde::{Deserialize, Serialize};
use settle_core::PaymentId;
use tracing::{info_span, Instrument};

use crate::error::{ErrorCategory, ProviderError, Result};

/// Production API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.asaas.com/v3";

/// Configuration for the Asaas client.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL, including the version segment.
    pub base_url: String,
    /// API key sent as a bearer credential.
    pub api_key: String,
    /// Per-request timeout; `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    /// User agent string for requests.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration against the production API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Self::default() }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout: Some(Duration::from_secs(15)),
            user_agent: concat!("settle/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Payment object returned by `GET /payments/{id}`.
///
/// Kept as raw JSON: only `status` is interpreted, and a missing or
/// non-string status must not fail the lookup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Payment(serde_json::Value);

impl Payment {
    /// Provider status code, if present as a string.
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(serde_json::Value::as_str)
    }

    /// Full payload as returned by Asaas.
    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Asaas API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct AsaasClient {
    client: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
}

impl AsaasClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::ConfigurationError` if the base URL is not an
    /// absolute http(s) URL or the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ProviderError::configuration(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ProviderError::configuration(format!(
                "base url must be http(s): {}",
                config.base_url
            )));
        }

        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url, config })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches a payment by id.
    ///
    /// # Errors
    ///
    /// - `Timeout` when the configured timeout elapses
    /// - `NetworkError` for connection failures
    /// - `HttpStatus` for any non-2xx answer, carrying status and body
    /// - `InvalidResponse` when a 2xx body is not JSON
    pub async fn get_payment(&self, payment_id: &PaymentId) -> Result<Payment> {
        let url = self.payment_url(payment_id)?;
        let span = info_span!("asaas_get_payment", payment_id = %payment_id);

        async move {
            tracing::debug!(url = %url, "Fetching payment from Asaas");

            let response = self
                .client
                .get(url)
                .bearer_auth(&self.config.api_key)
                .header(header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| self.classify_transport_error(&e))?;

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProviderError::network(format!("failed to read response body: {e}")))?;

            if !status.is_success() {
                let error = ProviderError::http_status(status.as_u16(), body_to_json(&bytes));
                tracing::warn!(
                    status = status.as_u16(),
                    category = %ErrorCategory::from(&error),
                    "Asaas returned an error response"
                );
                return Err(error);
            }

            let payment: Payment = serde_json::from_slice(&bytes)
                .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

            tracing::debug!(status = payment.status().unwrap_or("<missing>"), "Payment fetched");
            Ok(payment)
        }
        .instrument(span)
        .await
    }

    fn payment_url(&self, payment_id: &PaymentId) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::configuration("base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["payments", payment_id.as_str()]);
        Ok(url)
    }

    fn classify_transport_error(&self, error: &reqwest::Error) -> ProviderError {
        tracing::warn!("Asaas request failed: {}", error);

        if error.is_timeout() {
            let timeout_ms = self
                .config
                .timeout
                .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
            return ProviderError::timeout(timeout_ms);
        }
        if error.is_connect() {
            return ProviderError::network(format!("connection failed: {error}"));
        }
        ProviderError::network(error.to_string())
    }
}

/// Interprets an error body as JSON, falling back to a JSON string.
fn body_to_json(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
