//! Board-membership authorization.

use async_trait::async_trait;
use ordo_engine::{Authorizer, StoreError, StoreResult};

use super::Pool;

/// A principal may write a board it owns or belongs to; a column inherits
/// the access of its board.
#[derive(Debug, Clone)]
pub struct PgAuthorizer {
    pool: Pool,
}

impl PgAuthorizer {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Authorizer for PgAuthorizer {
    async fn can_write(&self, principal: &str, container_id: &str) -> StoreResult<bool> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM boards b
                WHERE (
                    b.id = $2
                    OR b.id = (SELECT board_id FROM columns WHERE id = $2)
                )
                AND (
                    b.owner_id = $1
                    OR EXISTS (
                        SELECT 1 FROM board_members m
                        WHERE m.board_id = b.id AND m.user_id = $1
                    )
                )
            )
            "#,
        )
        .bind(principal)
        .bind(container_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Authorization query failed: {:?}", e);
            StoreError::Unavailable(e.to_string())
        })
    }
}
