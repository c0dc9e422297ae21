//! Asaas webhook handler.
//!
//! Authenticates the call, pulls `payment.id` out of the event and hands it
//! to the [`Reconciler`](crate::Reconciler). Everything else in the event is
//! ignored.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use settle_core::{DomainStatus, PaymentId};
use tracing::{error, info, instrument, warn, Span};

use crate::{auth::Authorized, error::WebhookRejection, reconcile::Outcome, AppState};

/// Body of a 200 answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    /// Nothing to do.
    Skipped {
        /// Always `true`.
        ok: bool,
        /// `no_payment_id` or `no_doc_found`.
        message: &'static str,
    },
    /// Record updated.
    Updated {
        /// Always `true`.
        ok: bool,
        /// Domain label written.
        status: DomainStatus,
        /// Provider status written.
        #[serde(rename = "asaasStatus")]
        asaas_status: String,
    },
}

impl WebhookResponse {
    fn skipped(message: &'static str) -> Self {
        Self::Skipped { ok: true, message }
    }
}

/// Decodes a webhook body.
///
/// An empty body is an empty object. A body that decodes to a JSON string is
/// decoded a second time, for senders that double-encode.
///
/// # Errors
///
/// Returns the decoder error when either pass fails.
pub fn parse_payload(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }

    match serde_json::from_slice(body)? {
        Value::String(inner) => serde_json::from_str(&inner),
        value => Ok(value),
    }
}

/// Reads `payment.id` when it is a non-blank string.
pub fn payment_id_from(payload: &Value) -> Option<PaymentId> {
    payload
        .get("payment")
        .and_then(|payment| payment.get("id"))
        .and_then(Value::as_str)
        .and_then(|id| PaymentId::new(id).ok())
}

/// Longest payload excerpt written to the log.
const LOG_EXCERPT_CHARS: usize = 512;

/// Compact JSON of `payload`, cut at [`LOG_EXCERPT_CHARS`] characters.
fn log_excerpt(payload: &Value) -> String {
    let full = payload.to_string();
    match full.char_indices().nth(LOG_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &full[..cut]),
        None => full,
    }
}

/// Handles a POSTed Asaas event.
#[instrument(
    name = "asaas_webhook",
    skip_all,
    fields(
        content_length = body.len(),
        payment_id = tracing::field::Empty,
        asaas_event = tracing::field::Empty,
    )
)]
pub async fn receive_webhook(_auth: Authorized, State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON");
            return WebhookRejection::InvalidJson.into_response();
        },
    };

    if let Some(event) = payload.get("event").and_then(Value::as_str) {
        Span::current().record("asaas_event", event);
    }

    let Some(payment_id) = payment_id_from(&payload) else {
        info!(payload = %log_excerpt(&payload), "Webhook has no payment id, ignoring");
        return (StatusCode::OK, Json(WebhookResponse::skipped("no_payment_id"))).into_response();
    };
    Span::current().record("payment_id", payment_id.as_str());

    match state.reconciler.reconcile(&payment_id).await {
        Ok(Outcome::NoRecord) => {
            info!("No billing record for payment");
            (StatusCode::OK, Json(WebhookResponse::skipped("no_doc_found"))).into_response()
        },
        Ok(Outcome::Updated(update)) => (
            StatusCode::OK,
            Json(WebhookResponse::Updated {
                ok: true,
                status: update.status(),
                asaas_status: update.raw_status().to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(
                error = %e,
                status = e.upstream_status(),
                data = e.upstream_body().map(tracing::field::display),
                "WEBHOOK_ERROR"
            );
            e.into_response()
        },
    }
}

/// Fallback for methods the route does not serve.
pub async fn method_not_allowed() -> WebhookRejection {
    WebhookRejection::MethodNotAllowed
}
