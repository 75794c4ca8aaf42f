//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database cannot be reached
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub conflict_max_attempts: u32,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Liveness plus a database round trip. Always answers 200 so the process
/// is not restarted over a database outage.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Health check could not reach database: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: if database == "ok" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        conflict_max_attempts: state.engine.resolver_config().max_attempts,
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Ordo Ordering Server"
}
