//! Error responses for the webhook route.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use settle_asaas::ProviderError;
use settle_store::StoreError;
use thiserror::Error;

/// Requests turned away before any upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WebhookRejection {
    /// Method other than GET, HEAD or POST.
    #[error("method_not_allowed")]
    MethodNotAllowed,
    /// Token missing or wrong.
    #[error("invalid_token")]
    InvalidToken,
    /// Body is not JSON, or is a JSON string that is not JSON itself.
    #[error("invalid_json")]
    InvalidJson,
}

impl WebhookRejection {
    /// HTTP status for this rejection.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::InvalidJson => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

/// Failure while reconciling a payment.
///
/// Both variants carry the upstream status and body when the remote side
/// answered, so they can be echoed back to the caller.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// Asaas lookup failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Billing store lookup or update failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The whole request ran past its deadline.
    #[error("request timeout after {0}ms")]
    Deadline(u64),
}

impl ReconcileError {
    /// Upstream HTTP status, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Provider(e) => e.upstream_status(),
            Self::Store(e) => e.upstream_status(),
            Self::Deadline(_) => None,
        }
    }

    /// Upstream response body, if any.
    pub fn upstream_body(&self) -> Option<&Value> {
        match self {
            Self::Provider(e) => e.upstream_body(),
            Self::Store(e) => e.upstream_body(),
            Self::Deadline(_) => None,
        }
    }

    /// Diagnostic returned to the caller.
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            message: self.to_string(),
            status: self.upstream_status(),
            data: self.upstream_body().cloned(),
        }
    }
}

/// Error payload of a 500 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    pub message: String,
    /// Upstream HTTP status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Upstream response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl IntoResponse for ReconcileError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "ok": false, "error": self.detail() })))
            .into_response()
    }
}
