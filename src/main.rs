//! Price Tracker binary entrypoint.
//! Boots the Axum HTTP server, wiring the store, source registry, and routes.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use price_tracker::api::{create_router, AppState};
use price_tracker::config::AppConfig;
use price_tracker::lookup::providers::shop_api::ShopApi;
use price_tracker::lookup::registry::SourceRegistry;
use price_tracker::store::Store;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("price_tracker=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;

    let store = Store::open(&cfg.database_url)
        .await
        .with_context(|| format!("opening store at {}", cfg.database_url))?;

    let mut registry = SourceRegistry::new();
    for def in &cfg.sources {
        registry.register(Arc::new(ShopApi::new(&def.key, &def.name, &def.endpoint)));
    }
    tracing::info!(sources = registry.len(), "source registry ready");

    let state = AppState {
        store,
        registry: Arc::new(registry),
        update: cfg.update,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
