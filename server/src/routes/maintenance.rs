//! Maintenance routes.

use axum::{extract::State, routing::post, Json, Router};
use ordo_engine::ScanReport;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::handle_scan;
use crate::AppState;

/// Create maintenance routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/maintenance/scan", post(scan_handler))
}

/// POST /maintenance/scan - Repair duplicated positions.
async fn scan_handler(State(state): State<AppState>, auth: AuthUser) -> Result<Json<ScanReport>> {
    tracing::info!("Integrity scan requested by {}", auth.principal);
    let report = handle_scan(&state.engine).await?;
    Ok(Json(report))
}
