//! Test infrastructure for the settle workspace.
//!
//! [`TestEnv`] wires the real router to a wiremock stand-in for Asaas and an
//! in-memory billing store, with a manually driven clock for `updatedAt`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use axum::{body::Body, Router};
use http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use settle_api::{create_router, AppState, Reconciler, RouterConfig, WebhookToken};
use settle_asaas::{AsaasClient, ClientConfig};
use settle_core::{BillingRecord, RecordKey};
use settle_store::{BillingStore, MemoryStore};
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

pub mod fixtures;

pub use fixtures::{payment_event, payment_object, BillingRecordBuilder, WebhookRequest};
pub use settle_core::TestClock;

/// Webhook token accepted by routers built from a [`TestEnv`].
pub const TEST_WEBHOOK_TOKEN: &str = "test-webhook-token";

/// Asaas API key the provider mock expects.
pub const TEST_API_KEY: &str = "$aact_test_key";

/// Test environment for router-level tests.
pub struct TestEnv {
    /// Mock Asaas API.
    pub provider: MockServer,
    /// Billing records.
    pub store: Arc<MemoryStore>,
    /// Clock stamping `updatedAt` in the store.
    pub clock: TestClock,
    router_config: RouterConfig,
    provider_timeout: Option<Duration>,
}

impl TestEnv {
    /// Starts a provider mock and an empty store.
    pub async fn new() -> Self {
        let clock = TestClock::new();
        Self {
            provider: MockServer::start().await,
            store: Arc::new(MemoryStore::new(Arc::new(clock.clone()))),
            clock,
            router_config: RouterConfig::default(),
            provider_timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Serves the webhook under a different path.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.router_config.webhook_route = route.into();
        self
    }

    /// Sets the Asaas request timeout.
    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    /// Lets Asaas calls run without a client-side timeout.
    #[must_use]
    pub fn without_provider_timeout(mut self) -> Self {
        self.provider_timeout = None;
        self
    }

    /// Sets the whole-request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.router_config.request_timeout = timeout;
        self
    }

    /// Path of the webhook route.
    pub fn webhook_route(&self) -> &str {
        &self.router_config.webhook_route
    }

    /// Builds a router backed by this environment.
    pub fn router(&self) -> Router {
        let client = AsaasClient::new(ClientConfig {
            base_url: self.provider.uri(),
            api_key: TEST_API_KEY.to_string(),
            timeout: self.provider_timeout,
            ..ClientConfig::default()
        })
        .expect("provider client");

        let store: Arc<dyn BillingStore> = self.store.clone();
        let state = AppState::new(Reconciler::new(client, store), WebhookToken::new(TEST_WEBHOOK_TOKEN));
        create_router(state, &self.router_config)
    }

    /// Request builder for the webhook route.
    pub fn request(&self) -> WebhookRequest {
        WebhookRequest::new(self.webhook_route())
    }

    /// Sends a request through a fresh router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("response body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, headers, body }
    }

    /// POSTs a JSON event with the valid token in the header.
    pub async fn post_event(&self, event: &Value) -> TestResponse {
        self.send(self.request().header_token(TEST_WEBHOOK_TOKEN).json(event).build()).await
    }

    /// Makes the provider return a payment with `status`.
    pub async fn mock_payment(&self, payment_id: &str, status: &str) {
        self.mock_payment_response(payment_id, ResponseTemplate::new(200).set_body_json(payment_object(payment_id, status)))
            .await;
    }

    /// Makes the provider answer a payment lookup with `response`.
    pub async fn mock_payment_response(&self, payment_id: &str, response: ResponseTemplate) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(format!("/payments/{payment_id}")))
            .and(matchers::header("authorization", format!("Bearer {TEST_API_KEY}").as_str()))
            .respond_with(response)
            .mount(&self.provider)
            .await;
    }

    /// Number of requests the provider mock received.
    pub async fn provider_calls(&self) -> usize {
        self.provider.received_requests().await.map_or(0, |requests| requests.len())
    }

    /// Adds a billing record.
    pub async fn insert_record(&self, record: BillingRecord) {
        self.store.insert(record).await;
    }

    /// Reads a billing record by key.
    pub async fn record(&self, key: &RecordKey) -> Option<BillingRecord> {
        self.store.get(key).await
    }
}

/// Response captured from the router.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Headers.
    pub headers: HeaderMap,
    /// Body parsed as JSON, `Null` when empty or not JSON.
    pub body: Value,
}
