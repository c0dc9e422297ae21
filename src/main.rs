//! Settle: Asaas payment webhook reconciler.
//!
//! Main entry point. Loads configuration, builds the Asaas client and the
//! Firestore store once, and serves the webhook route until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use settle_api::{create_router, start_server, AppState, Config, Reconciler, Secrets, WebhookToken};
use settle_asaas::AsaasClient;
use settle_store::{BillingStore, Credentials, FirestoreStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting settle payment reconciler");

    let secrets = Secrets::from_env()?;
    let credentials = Credentials::from_env().context("Failed to load Firestore credentials")?;
    let addr = config.parse_server_addr()?;
    info!(
        server_addr = %addr,
        webhook_route = %config.webhook_route,
        asaas_base_url = %config.asaas_base_url,
        collection = %config.billing_collection,
        project_id = credentials.project_id(),
        emulator = matches!(credentials, Credentials::Emulator { .. }),
        "Configuration loaded"
    );

    let provider = AsaasClient::new(config.to_client_config(&secrets.asaas_api_key))
        .context("Failed to build Asaas client")?;

    let store: Arc<dyn BillingStore> = Arc::new(
        FirestoreStore::new(
            config.to_firestore_config(),
            &credentials,
            Arc::new(settle_core::RealClock::new()),
        )
        .context("Failed to build Firestore store")?,
    );

    let state = AppState::new(
        Reconciler::new(provider, store),
        WebhookToken::new(secrets.webhook_token.as_str()),
    );
    let app = create_router(state, &config.to_router_config());

    start_server(app, addr).await.context("HTTP server failed")?;

    info!("Settle shutdown complete");
    Ok(())
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init().context("Failed to install tracing subscriber")?;
    Ok(())
}
