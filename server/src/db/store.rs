//! PostgreSQL implementation of the engine's store port.
//!
//! Boards contain columns and columns contain cards. The `columns` and
//! `cards` tables each carry a `UNIQUE (parent, position)` constraint named
//! `*_position_key`; a violation of it is the collision the conflict resolver
//! retries. Any other unique violation is a duplicate ID.

use async_trait::async_trait;
use ordo_engine::{
    Container, ContainerKind, Item, ItemKind, OrderingStore, Position, StoreError, StoreResult,
};
use sqlx::Row;

use super::Pool;

/// A stored column or card row.
#[derive(Debug)]
pub struct StoredItem {
    pub id: String,
    pub kind: String,
    pub container_id: String,
    pub position: i64,
    pub created_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredItem {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredItem {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            container_id: row.try_get("container_id")?,
            position: row.try_get("position")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredItem {
    /// Convert database row to an engine Item.
    pub fn to_item(&self) -> StoreResult<Item> {
        let kind = match self.kind.as_str() {
            "column" => ItemKind::Column,
            "card" => ItemKind::Card,
            other => {
                return Err(StoreError::Unavailable(format!(
                    "unknown item kind in row {}: {other}",
                    self.id
                )))
            }
        };
        Ok(Item::new(
            &self.id,
            kind,
            &self.container_id,
            self.position,
            self.created_at,
        ))
    }
}

const ITEM_COLUMNS: &str = r#"
    SELECT id, 'column' AS kind, board_id AS container_id, position, created_at FROM columns
"#;

const CARD_COLUMNS: &str = r#"
    SELECT id, 'card' AS kind, column_id AS container_id, position, created_at FROM cards
"#;

/// [`OrderingStore`] over the board tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn container_kind(kind: &str) -> StoreResult<ContainerKind> {
    match kind {
        "board" => Ok(ContainerKind::Board),
        "column" => Ok(ContainerKind::Column),
        other => Err(StoreError::Unavailable(format!(
            "unknown container kind: {other}"
        ))),
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::error!("Store query failed: {:?}", err);
    StoreError::Unavailable(err.to_string())
}

/// Classify a failed write.
fn write_error(err: sqlx::Error, item_id: &str, container_id: &str, position: Position) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let on_position = db
                .constraint()
                .is_some_and(|name| name.ends_with("_position_key"));
            return if on_position {
                StoreError::UniqueViolation {
                    container: container_id.to_string(),
                    position,
                }
            } else {
                StoreError::AlreadyExists(item_id.to_string())
            };
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound(format!("container {container_id}"));
        }
    }
    unavailable(err)
}

#[async_trait]
impl OrderingStore for PgStore {
    async fn container(&self, id: &str) -> StoreResult<Option<Container>> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, 'board' AS kind FROM boards WHERE id = $1
            UNION ALL
            SELECT id, 'column' AS kind FROM columns WHERE id = $1
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(|(id, kind)| container_kind(&kind).map(|kind| Container::new(id, kind)))
            .transpose()
    }

    async fn containers(&self) -> StoreResult<Vec<Container>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, 'board' AS kind FROM boards
            UNION ALL
            SELECT id, 'column' AS kind FROM columns
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(|(id, kind)| container_kind(&kind).map(|kind| Container::new(id, kind)))
            .collect()
    }

    async fn item(&self, id: &str) -> StoreResult<Option<Item>> {
        let sql = format!(
            "{ITEM_COLUMNS} WHERE id = $1 UNION ALL {CARD_COLUMNS} WHERE id = $1 LIMIT 1"
        );
        let row: Option<StoredItem> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.map(|row| row.to_item()).transpose()
    }

    async fn items_in(&self, container_id: &str) -> StoreResult<Vec<Item>> {
        let sql = format!(
            "{ITEM_COLUMNS} WHERE board_id = $1 UNION ALL {CARD_COLUMNS} WHERE column_id = $1 \
             ORDER BY position, id"
        );
        let rows: Vec<StoredItem> = sqlx::query_as(&sql)
            .bind(container_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter().map(StoredItem::to_item).collect()
    }

    async fn insert_item(&self, item: &Item) -> StoreResult<()> {
        let sql = match item.kind {
            ItemKind::Column => {
                "INSERT INTO columns (id, board_id, position, created_at) VALUES ($1, $2, $3, $4)"
            }
            ItemKind::Card => {
                "INSERT INTO cards (id, column_id, position, created_at) VALUES ($1, $2, $3, $4)"
            }
        };

        sqlx::query(sql)
            .bind(&item.id)
            .bind(&item.container_id)
            .bind(item.position)
            .bind(item.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, &item.id, &item.container_id, item.position))?;

        Ok(())
    }

    async fn place(
        &self,
        item_id: &str,
        container_id: &str,
        position: Position,
    ) -> StoreResult<()> {
        for sql in [
            "UPDATE cards SET column_id = $2, position = $3 WHERE id = $1",
            "UPDATE columns SET board_id = $2, position = $3 WHERE id = $1",
        ] {
            let result = sqlx::query(sql)
                .bind(item_id)
                .bind(container_id)
                .bind(position)
                .execute(&self.pool)
                .await
                .map_err(|e| write_error(e, item_id, container_id, position))?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }

        Err(StoreError::NotFound(format!("item {item_id}")))
    }
}
