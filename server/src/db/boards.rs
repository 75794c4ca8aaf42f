//! Board rows and display titles.
//!
//! These sit beside the ordering store: titles and membership never affect
//! position, so the engine does not see them.

use ordo_engine::ItemKind;

use super::Pool;

/// Insert a board owned by `owner_id`.
pub async fn create_board(
    pool: &Pool,
    id: &str,
    owner_id: &str,
    title: &str,
    created_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO boards (id, owner_id, title, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(title)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Grant `user_id` access to a board. Adding an existing member is a no-op.
pub async fn add_member(pool: &Pool, board_id: &str, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO board_members (board_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (board_id, user_id) DO NOTHING
        "#,
    )
    .bind(board_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the title of a column or card.
pub async fn set_title(
    pool: &Pool,
    kind: ItemKind,
    id: &str,
    title: &str,
) -> Result<(), sqlx::Error> {
    let sql = match kind {
        ItemKind::Column => "UPDATE columns SET title = $2 WHERE id = $1",
        ItemKind::Card => "UPDATE cards SET title = $2 WHERE id = $1",
    };

    sqlx::query(sql).bind(id).bind(title).execute(pool).await?;

    Ok(())
}

/// Remove a column or card. Removing a column also removes its cards.
pub async fn delete_item(pool: &Pool, kind: ItemKind, id: &str) -> Result<(), sqlx::Error> {
    let sql = match kind {
        ItemKind::Column => "DELETE FROM columns WHERE id = $1",
        ItemKind::Card => "DELETE FROM cards WHERE id = $1",
    };

    sqlx::query(sql).bind(id).execute(pool).await?;

    Ok(())
}

/// Titles of a container's children keyed by ID.
pub async fn titles_in(
    pool: &Pool,
    container_id: &str,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, title FROM columns WHERE board_id = $1
        UNION ALL
        SELECT id, title FROM cards WHERE column_id = $1
        "#,
    )
    .bind(container_id)
    .fetch_all(pool)
    .await
}
