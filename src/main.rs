use actix::prelude::*;
use std::path::Path;
use std::sync::Arc;
use anyhow::Context as _;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod models;
mod config;
mod domain;
mod store;
mod messaging;
mod actors;
mod metrics;
mod utils;
mod api;

use actors::NotificationHub;
use config::{Config, StaticSettings};
use domain::order::OrderService;
use messaging::HubNotifier;
use models::Product;
use store::{AlertStore, MemoryStore, PgStore, Store};
use utils::RetryConfig;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stock_orders=debug"))
        )
        .init();

    tracing::info!("🚀 Starting stock-orders service");

    // === 1. Configuration ===
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        metrics_port = config.metrics_port,
        low_stock = config.thresholds.low_stock,
        out_of_stock = config.thresholds.out_of_stock,
        tx_retry_attempts = config.tx_retry_attempts,
        "Configuration loaded"
    );

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Storage ===
    let seed = match &config.seed_products {
        Some(path) => load_products(path)?,
        None => Vec::new(),
    };

    let (store, alerts): (Arc<dyn Store>, Arc<dyn AlertStore>) = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let pg = PgStore::connect(url, config.database_max_connections).await?;
            pg.migrate().await?;
            for product in &seed {
                pg.upsert_product(product).await?;
            }
            if !seed.is_empty() {
                tracing::info!(products = seed.len(), "🌱 Seeded product catalog");
            }
            let pg = Arc::new(pg);
            (pg.clone() as Arc<dyn Store>, pg as Arc<dyn AlertStore>)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let memory = Arc::new(MemoryStore::with_products(seed.iter().cloned()));
            tracing::info!(products = memory.product_count().await, "🌱 In-memory catalog ready");
            (memory.clone() as Arc<dyn Store>, memory as Arc<dyn AlertStore>)
        }
    };

    // === 4. Notification hub ===
    let hub = NotificationHub::default().start();

    // === 5. Order service ===
    let service = Arc::new(OrderService::new(
        store,
        alerts,
        Arc::new(StaticSettings::new(config.thresholds)),
        Arc::new(HubNotifier::new(hub.clone())),
        metrics.clone(),
        RetryConfig::with_attempts(config.tx_retry_attempts),
    ));

    // === 6. Serve API and metrics until shutdown ===
    let metrics_registry = Arc::new(metrics.registry().clone());
    futures_util::future::try_join(
        api::start_api_server(service, hub, config.http_port),
        metrics::start_metrics_server(metrics_registry, config.metrics_port),
    )
    .await?;

    tracing::info!("👋 Shutdown complete");
    Ok(())
}

fn load_products(path: &Path) -> anyhow::Result<Vec<Product>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading SEED_PRODUCTS file {}", path.display()))?;
    let products: Vec<Product> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing SEED_PRODUCTS file {}", path.display()))?;

    if let Some(bad) = products.iter().find(|p| p.stock < 0) {
        anyhow::bail!("seed product {} has negative stock", bad.id);
    }
    Ok(products)
}
