//! Test data builders for billing records, webhook events and requests.

use axum::body::Body;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{Method, Request};
use serde_json::{json, Value};
use settle_core::{BillingRecord, PaymentId, RecordKey};

/// Builder for billing records.
#[derive(Debug, Clone)]
pub struct BillingRecordBuilder {
    key: String,
    payment_id: String,
    status: Option<String>,
    raw_status: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl BillingRecordBuilder {
    /// Creates an unreconciled record for `payment_id`.
    ///
    /// The key defaults to a Firestore-style document name derived from the
    /// payment id.
    pub fn new(payment_id: impl Into<String>) -> Self {
        let payment_id = payment_id.into();
        Self {
            key: format!("projects/demo-settle/databases/(default)/documents/faturamento/doc_{payment_id}"),
            payment_id,
            status: None,
            raw_status: None,
            updated_at: None,
        }
    }

    /// Sets the record key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the stored domain label.
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the stored provider status.
    #[must_use]
    pub fn raw_status(mut self, raw_status: impl Into<String>) -> Self {
        self.raw_status = Some(raw_status.into());
        self
    }

    /// Sets the last reconciliation time.
    #[must_use]
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics if the payment id is blank.
    #[allow(clippy::expect_used)]
    pub fn build(self) -> BillingRecord {
        BillingRecord {
            key: RecordKey(self.key),
            asaas_payment_id: PaymentId::new(self.payment_id).expect("fixture payment id must not be blank"),
            status: self.status,
            asaas_raw_status: self.raw_status,
            updated_at: self.updated_at,
        }
    }
}

/// Asaas webhook event body for a payment.
pub fn payment_event(event: &str, payment_id: &str) -> Value {
    json!({
        "id": format!("evt_{payment_id}"),
        "event": event,
        "dateCreated": "2024-05-01 12:00:00",
        "payment": {
            "object": "payment",
            "id": payment_id,
            "customer": "cus_000005219613",
            "value": 129.9,
            "billingType": "PIX",
            "status": "RECEIVED"
        }
    })
}

/// Asaas payment object as returned by `GET /payments/{id}`.
pub fn payment_object(payment_id: &str, status: &str) -> Value {
    json!({
        "object": "payment",
        "id": payment_id,
        "customer": "cus_000005219613",
        "value": 129.9,
        "netValue": 128.91,
        "billingType": "PIX",
        "status": status,
        "dueDate": "2024-05-10"
    })
}

/// Where the webhook token is placed on a request.
#[derive(Debug, Clone)]
enum TokenPlacement {
    None,
    Query(String),
    Header(String),
    Both { query: String, header: String },
}

/// Builder for requests against the webhook route.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    route: String,
    method: Method,
    token: TokenPlacement,
    body: Bytes,
    content_type: Option<String>,
}

impl WebhookRequest {
    /// Creates a POST to `route` with no token and an empty body.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            method: Method::POST,
            token: TokenPlacement::None,
            body: Bytes::new(),
            content_type: None,
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sends the token as the `token` query parameter.
    #[must_use]
    pub fn query_token(mut self, token: impl Into<String>) -> Self {
        self.token = TokenPlacement::Query(token.into());
        self
    }

    /// Sends the token in the `x-webhook-token` header.
    #[must_use]
    pub fn header_token(mut self, token: impl Into<String>) -> Self {
        self.token = TokenPlacement::Header(token.into());
        self
    }

    /// Sends different tokens in the query and the header.
    #[must_use]
    pub fn both_tokens(mut self, query: impl Into<String>, header: impl Into<String>) -> Self {
        self.token = TokenPlacement::Both { query: query.into(), header: header.into() };
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, value: &Value) -> Self {
        self.body = Bytes::from(value.to_string());
        self.content_type = Some("application/json".to_string());
        self
    }

    /// Sets a raw body without a content type.
    #[must_use]
    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.content_type = None;
        self
    }

    /// Builds the request.
    ///
    /// # Panics
    ///
    /// Panics if the route or token produce an invalid URI or header.
    #[allow(clippy::expect_used)]
    pub fn build(self) -> Request<Body> {
        let (query, header) = match self.token {
            TokenPlacement::None => (None, None),
            TokenPlacement::Query(token) => (Some(token), None),
            TokenPlacement::Header(token) => (None, Some(token)),
            TokenPlacement::Both { query, header } => (Some(query), Some(header)),
        };

        let uri = match query {
            Some(token) => format!("{}?token={}", self.route, encode_query_value(&token)),
            None => self.route,
        };

        let mut builder = Request::builder().method(self.method).uri(uri);
        if let Some(token) = header {
            builder = builder.header("x-webhook-token", token);
        }
        if let Some(content_type) = self.content_type {
            builder = builder.header("content-type", content_type);
        }

        builder.body(Body::from(self.body)).expect("valid webhook request")
    }
}

fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
