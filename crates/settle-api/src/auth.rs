//! Shared-secret authentication for webhook calls.
//!
//! Asaas sends the token configured on its side either as a `token` query
//! parameter or in the `x-webhook-token` header. The query parameter wins
//! when both are present and non-empty.

use std::{fmt, sync::Arc};

use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap, Uri},
};
use tracing::debug;

use crate::{error::WebhookRejection, AppState};

/// Header carrying the webhook token.
pub const TOKEN_HEADER: &str = "x-webhook-token";

/// Expected webhook secret.
#[derive(Clone)]
pub struct WebhookToken(Arc<str>);

impl WebhookToken {
    /// Wraps the configured secret.
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    /// Checks a presented token against the secret.
    pub fn matches(&self, presented: &str) -> bool {
        timing_safe_eq(&self.0, presented)
    }
}

impl fmt::Debug for WebhookToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookToken(***)")
    }
}

/// Extracts the presented token from the query string or header.
///
/// An empty query value falls through to the header. A query string carrying
/// `token` more than once, or one that cannot be decoded, is a presented but
/// unusable token and never falls through.
///
/// # Errors
///
/// Returns `WebhookRejection::InvalidToken` for an ambiguous or malformed
/// query token.
pub fn extract_token(uri: &Uri, headers: &HeaderMap) -> Result<Option<String>, WebhookRejection> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).map_err(|e| {
        debug!(error = %e, "Undecodable query string");
        WebhookRejection::InvalidToken
    })?;

    let from_query: Vec<String> =
        pairs.into_iter().filter(|(key, _)| key == "token").map(|(_, value)| value).collect();

    match from_query.as_slice() {
        [token] if !token.is_empty() => Ok(Some(token.clone())),
        [] | [_] => Ok(headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()).map(String::from)),
        _ => {
            debug!(count = from_query.len(), "Repeated token query parameter");
            Err(WebhookRejection::InvalidToken)
        },
    }
}

/// Proof that the request carried the webhook secret.
///
/// Extracted before the body, so rejected calls never have their payload
/// read.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

impl FromRequestParts<AppState> for Authorized {
    type Rejection = WebhookRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match extract_token(&parts.uri, &parts.headers)? {
            Some(token) if state.webhook_token.matches(&token) => Ok(Self),
            Some(_) => {
                debug!("Webhook token mismatch");
                Err(WebhookRejection::InvalidToken)
            },
            None => {
                debug!("Webhook token missing");
                Err(WebhookRejection::InvalidToken)
            },
        }
    }
}

/// Constant-time string comparison.
///
/// Only the length is allowed to leak through timing.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.as_bytes().iter().zip(b.as_bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}
