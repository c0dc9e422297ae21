//! Route probe handler.
//!
//! Asaas and uptime checkers hit the webhook URL with GET to verify it is
//! deployed. The probe needs no token and touches no upstream.

use axum::Json;
use serde::Serialize;
use tracing::{debug, instrument};

/// Name reported by the probe.
pub const ROUTE_NAME: &str = "asaas-webhook";

/// Probe response body.
#[derive(Debug, Serialize)]
pub struct RouteInfo {
    /// Always `true`.
    pub ok: bool,
    /// Route name.
    pub route: &'static str,
}

/// Answers GET and HEAD on the webhook route.
#[instrument(name = "route_info")]
pub async fn route_info() -> Json<RouteInfo> {
    debug!("Route probe");
    Json(RouteInfo { ok: true, route: ROUTE_NAME })
}
