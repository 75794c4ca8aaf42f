//! Board creation and membership.

use serde::{Deserialize, Serialize};

use crate::db::{self, Pool};
use crate::error::{AppError, Result};
use crate::handlers::clean_title;

/// Body of `POST /boards`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    /// Principals who may edit the board besides its owner
    #[serde(default)]
    pub members: Vec<String>,
}

/// A created board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResponse {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub members: Vec<String>,
}

/// Create a board owned by `principal`.
pub async fn handle_create_board(
    pool: &Pool,
    principal: &str,
    now: i64,
    request: CreateBoardRequest,
) -> Result<BoardResponse> {
    let title = clean_title(&request.title)?;
    let id = match request.id {
        Some(id) if id.trim().is_empty() => {
            return Err(AppError::BadRequest("id must not be empty".into()))
        }
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    db::create_board(pool, &id, principal, &title, now).await?;

    let mut members = Vec::with_capacity(request.members.len());
    for member in request.members {
        let member = member.trim().to_string();
        if member.is_empty() || member == principal || members.contains(&member) {
            continue;
        }
        db::add_member(pool, &id, &member).await?;
        members.push(member);
    }

    tracing::info!("Created board {} for {} ({} members)", id, principal, members.len());

    Ok(BoardResponse {
        id,
        owner_id: principal.to_string(),
        title,
        members,
    })
}
