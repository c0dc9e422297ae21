//! HTTP server setup and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Deadline enforcement (30s default, answered as a JSON 500)
//! 4. Handler execution
//!
//! The webhook route answers GET/HEAD with a probe, POST with the
//! reconciliation and anything else with 405.
//!
//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections and lets
//! in-flight requests finish.

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{handlers, AppState, ReconcileError};

/// Default path of the webhook route.
pub const DEFAULT_WEBHOOK_ROUTE: &str = "/api/asaas-webhook";

/// Routing options.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Path of the webhook route.
    pub webhook_route: String,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { webhook_route: DEFAULT_WEBHOOK_ROUTE.to_string(), request_timeout: Duration::from_secs(30) }
    }
}

/// Creates the Axum router with the webhook route and middleware.
///
/// # Example
///
/// ```no_run
/// use settle_api::{create_router, AppState, RouterConfig};
///
/// fn build(state: AppState) -> axum::Router {
///     create_router(state, &RouterConfig::default())
/// }
/// ```
pub fn create_router(state: AppState, config: &RouterConfig) -> Router {
    let webhook = get(handlers::route_info)
        .post(handlers::receive_webhook)
        .fallback(handlers::method_not_allowed);

    Router::new()
        .route(&config.webhook_route, webhook)
        .layer(middleware::from_fn_with_state(config.request_timeout, enforce_deadline))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware bounding the whole request.
///
/// A request still running at the deadline is dropped and answered with the
/// same 500 shape as any other reconciliation failure.
async fn enforce_deadline(State(deadline): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            let e = ReconcileError::Deadline(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
            error!(error = %e, "WEBHOOK_ERROR");
            e.into_response()
        },
    }
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(app: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
