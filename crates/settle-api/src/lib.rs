//! Settle HTTP API.
//!
//! Receives Asaas payment webhooks, re-reads the payment from Asaas and
//! writes the mapped status onto the matching billing record.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod reconcile;
pub mod server;

pub use auth::WebhookToken;
pub use config::{Config, Secrets};
pub use error::{ErrorDetail, ReconcileError, WebhookRejection};
pub use reconcile::{Outcome, Reconciler};
pub use server::{create_router, start_server, RouterConfig};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Provider lookup and record update pipeline.
    pub reconciler: Arc<Reconciler>,
    /// Shared secret expected on webhook calls.
    pub webhook_token: WebhookToken,
}

impl AppState {
    /// Creates application state.
    pub fn new(reconciler: Reconciler, webhook_token: WebhookToken) -> Self {
        Self { reconciler: Arc::new(reconciler), webhook_token }
    }
}
