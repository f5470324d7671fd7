mod actions;
mod config;
mod errors;
mod models;
mod routes;
mod services;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::actions::evaluation::KeywordEvaluator;
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{CouchClient, DocumentStore, REQUIRED_COLLECTIONS, REQUIRED_INDEXES};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PallyBot action server v{}", env!("CARGO_PKG_VERSION"));

    // One store handle for the whole process, shared by every service
    let couch = CouchClient::connect(&config, &REQUIRED_COLLECTIONS, &REQUIRED_INDEXES).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(couch);

    // Keyword scoring by default; any ResponseEvaluator can be swapped in here
    let state = AppState::new(store, Arc::new(KeywordEvaluator));
    info!("Registered actions: {}", state.actions.names().join(", "));

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped; CouchDB client released");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
