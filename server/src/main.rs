//! Ordo Server - HTTP front end for board, column and card ordering.
//!
//! Exposes the ordo-engine operations over JSON: append, reorder, move and
//! the duplicate-position scan, persisted in PostgreSQL.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod routes;

use crate::config::Config;
use crate::db::{PgAuthorizer, PgStore, Pool};
use axum::Router;
use ordo_engine::OrderingEngine;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrderingEngine>,
    pub store: Arc<PgStore>,
    pub pool: Pool,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ordo_server=debug,ordo_engine=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Ordo Server on {}:{}", config.host, config.port);

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Build the ordering engine over PostgreSQL
    let store = Arc::new(PgStore::new(pool.clone()));
    let engine = OrderingEngine::builder(store.clone(), Arc::new(PgAuthorizer::new(pool.clone())))
        .resolver_config(config.resolver())
        .build();

    if config.scan_on_startup {
        match engine.scan().await {
            Ok(report) if !report.is_clean() => tracing::warn!(
                "Startup scan repaired {} containers ({} items)",
                report.containers_repaired,
                report.items_rewritten
            ),
            Ok(_) => {}
            Err(e) => tracing::error!("Startup scan failed: {}", e),
        }
    }

    // Build application state
    let state = AppState {
        engine: Arc::new(engine),
        store,
        pool,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
