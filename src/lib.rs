#![recursion_limit = "512"]

pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{AssetError, Result};

// Export logic types
pub use logic::{Attributes, CycleGuard, Hierarchy, Resolver, ValueValidator, MAX_HIERARCHY_DEPTH};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use crate::config::{AppConfig, StorageBackend};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Initialize logging with INFO as the default level and sqlx kept quiet.
/// `RUST_LOG` overrides both.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Serve the API on an already bound listener
pub async fn serve_with_store<S: Store + 'static>(
    listener: TcpListener,
    store: Arc<S>,
) -> anyhow::Result<()> {
    let app = api::routes::create_router::<S>().with_state(store);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn prepare_and_serve<S: Store + 'static>(
    store: Arc<S>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(&*store).await?;
    }

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Asset hierarchy server running on http://{}", bind_address);
    log::info!(
        "OpenAPI document available at http://{}/docs/openapi.json",
        bind_address
    );

    serve_with_store(listener, store).await
}

/// Load configuration, connect the configured store and serve until shutdown
pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}, storage={:?}",
        config.server.host,
        config.server.port,
        config.storage.backend
    );

    match config.storage.backend {
        StorageBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            store.migrate().await?;

            prepare_and_serve(Arc::new(store), &config).await
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; data is lost on shutdown");
            prepare_and_serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}
