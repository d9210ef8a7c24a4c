//! Prediction gateway.
//!
//! Routes JSON prediction requests to per-model microservices selected by
//! a model identifier, relays their responses, and reports downstream
//! reachability.

mod config;
mod registry;
mod relay;
mod server;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::GatewayConfig;
use relay::{HttpTransport, RelayEngine};
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::load().context("failed to load gateway configuration")?;
    let registry = Arc::new(config.build_registry().context("invalid model registry")?);

    for entry in registry.entries() {
        tracing::info!(model = %entry.name, address = %entry.base_address, "registered model");
    }
    if !registry.contains(&config.default_model) {
        tracing::warn!(
            default_model = %config.default_model,
            "default model is not registered; /predict will reject requests"
        );
    }

    let transport = Arc::new(
        HttpTransport::new(config.relay_timeout()).context("failed to build HTTP client")?,
    );
    let engine = RelayEngine::new(
        registry,
        transport,
        config.default_model.clone(),
        config.probe_timeout(),
    );
    let state = Arc::new(AppState::new(engine, &config).context("invalid server configuration")?);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        addr = %config.listen_addr,
        models = state.engine.registry().len(),
        default_model = %state.engine.default_model(),
        "prediction gateway listening"
    );

    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await
    .context("server error")?;

    tracing::info!("prediction gateway stopped");
    Ok(())
}
