//! Board, container and item routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use ordo_engine::{Ack, Clock, SystemClock};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_create, handle_create_board, handle_list, handle_move, handle_reorder,
    BoardResponse, CreateBoardRequest, CreateItemRequest, CreatedItem, ItemsResponse,
    MoveRequest, ReorderRequest,
};
use crate::AppState;

/// Create ordering routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/boards", post(create_board_handler))
        .route(
            "/containers/{id}/items",
            get(list_handler).post(create_handler),
        )
        .route("/containers/{id}/order", put(reorder_handler))
        .route("/items/{id}/move", post(move_handler))
}

/// POST /boards - Create a board owned by the caller.
async fn create_board_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<BoardResponse>)> {
    let now = SystemClock.now_millis();
    let board = handle_create_board(&state.pool, &auth.principal, now, request).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

/// GET /containers/{id}/items - Children in display order.
async fn list_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(container_id): Path<String>,
) -> Result<Json<ItemsResponse>> {
    let response = handle_list(&state.engine, &state.pool, &auth.principal, &container_id).await?;
    Ok(Json(response))
}

/// POST /containers/{id}/items - Append a new column or card.
async fn create_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(container_id): Path<String>,
    Json(request): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<CreatedItem>)> {
    let item = handle_create(
        &state.engine,
        &state.store,
        &auth.principal,
        &container_id,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /containers/{id}/order - Rewrite a container's order.
async fn reorder_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(container_id): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Ack>> {
    let ack = handle_reorder(&state.engine, &auth.principal, &container_id, request).await?;
    Ok(Json(ack))
}

/// POST /items/{id}/move - Move an item to another position or container.
async fn move_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Ack>> {
    let ack = handle_move(&state.engine, &auth.principal, &item_id, request).await?;
    Ok(Json(ack))
}
