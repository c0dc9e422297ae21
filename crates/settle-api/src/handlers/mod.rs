//! HTTP request handlers.
//!
//! - `health` answers GET probes on the webhook route
//! - `webhook` runs the reconciliation for POSTed Asaas events

pub mod health;
pub mod webhook;

pub use health::route_info;
pub use webhook::{method_not_allowed, receive_webhook};
