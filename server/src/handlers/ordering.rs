//! Ordering handlers: list, create, reorder, move and scan.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;

use ordo_engine::{
    Ack, ItemId, ItemKind, NewItem, OrderingEngine, OrderingStore, Position, ScanReport,
    TargetIndex, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::db::{self, PgStore, Pool};
use crate::error::{AppError, Result};

/// Longest accepted title, in characters.
pub const MAX_TITLE_LEN: usize = 500;

/// Body of `POST /containers/{id}/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    /// Client-chosen ID; generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
}

/// Body of `PUT /containers/{id}/order`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub item_ids: Vec<ItemId>,
}

/// Body of `POST /items/{id}/move`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub source_id: String,
    pub target_id: String,
    /// Target index; absent or `null` appends
    #[serde(default)]
    pub index: TargetIndex,
}

/// One child of a container as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub position: Position,
    pub created_at: Timestamp,
}

/// Response of `GET /containers/{id}/items`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsResponse {
    pub container_id: String,
    pub items: Vec<ItemView>,
}

/// Response of `POST /containers/{id}/items`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedItem {
    pub id: String,
    pub kind: ItemKind,
    pub container_id: String,
    pub title: String,
    pub position: Position,
}

/// Validate and normalize a title.
pub fn clean_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Authoritative order of a container's children, with titles.
pub async fn handle_list(
    engine: &OrderingEngine,
    pool: &Pool,
    principal: &str,
    container_id: &str,
) -> Result<ItemsResponse> {
    let items = engine.order_of(principal, container_id).await?;
    let titles: HashMap<String, String> = db::titles_in(pool, container_id)
        .await?
        .into_iter()
        .collect();

    let items = items
        .into_iter()
        .map(|item| ItemView {
            title: titles.get(&item.id).cloned().unwrap_or_default(),
            id: item.id,
            kind: item.kind,
            position: item.position,
            created_at: item.created_at,
        })
        .collect();

    Ok(ItemsResponse {
        container_id: container_id.to_string(),
        items,
    })
}

/// Create a column in a board or a card in a column, appended at the end.
pub async fn handle_create(
    engine: &OrderingEngine,
    store: &PgStore,
    principal: &str,
    container_id: &str,
    request: CreateItemRequest,
) -> Result<CreatedItem> {
    let title = clean_title(&request.title)?;
    let container = store
        .container(container_id)
        .await
        .map_err(ordo_engine::Error::from)?
        .ok_or_else(|| ordo_engine::Error::NotFound(format!("container {container_id}")))?;

    let kind = container.kind.child_kind();
    let id = match request.id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::BadRequest("id must not be empty".into()))
        }
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    let position = engine
        .assign_position(principal, NewItem::new(id.clone(), kind, container.id.clone()))
        .await?;
    let titled = db::set_title(store.pool(), kind, &id, &title).await;
    undo_on_error(titled, || db::delete_item(store.pool(), kind, &id)).await?;

    tracing::info!(
        "Created {} {} in {} at {}",
        kind.as_str(),
        id,
        container.id,
        position
    );

    Ok(CreatedItem {
        id,
        kind,
        container_id: container.id,
        title,
        position,
    })
}

/// Return `outcome` unchanged, running `undo` first if it failed.
///
/// A failed undo is logged; the caller still sees the original error.
async fn undo_on_error<T, E, F, U, UE>(
    outcome: std::result::Result<T, E>,
    undo: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> U,
    U: Future<Output = std::result::Result<(), UE>>,
    E: Display,
    UE: Display,
{
    if let Err(e) = &outcome {
        tracing::warn!("Write failed, undoing: {}", e);
        if let Err(undo_err) = undo().await {
            tracing::error!("Undo after failed write also failed: {}", undo_err);
        }
    }
    outcome
}

/// Rewrite a container to the requested order.
pub async fn handle_reorder(
    engine: &OrderingEngine,
    principal: &str,
    container_id: &str,
    request: ReorderRequest,
) -> Result<Ack> {
    let ack = engine
        .reorder(principal, container_id, &request.item_ids)
        .await?;
    tracing::info!("Reordered {} ({} writes)", container_id, ack.written);
    Ok(ack)
}

/// Move one item between (or within) containers.
pub async fn handle_move(
    engine: &OrderingEngine,
    principal: &str,
    item_id: &str,
    request: MoveRequest,
) -> Result<Ack> {
    let ack = engine
        .move_item(
            principal,
            item_id,
            &request.source_id,
            &request.target_id,
            request.index,
        )
        .await?;
    tracing::info!(
        "Moved {} from {} to {} ({} writes)",
        item_id,
        request.source_id,
        request.target_id,
        ack.written
    );
    Ok(ack)
}

/// Repair duplicated positions across all containers.
pub async fn handle_scan(engine: &OrderingEngine) -> Result<ScanReport> {
    Ok(engine.scan().await?)
}
