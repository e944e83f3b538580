//! Invite repository for database operations.

use async_trait::async_trait;
use domain::errors::StoreError;
use domain::models::Invite;
use domain::store::InviteStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::InviteEntity;
use crate::metrics::QueryTimer;
use crate::repositories::store_err;

/// Repository for group invite codes.
#[derive(Clone)]
pub struct InviteRepository {
    pool: PgPool,
}

impl InviteRepository {
    /// Creates a new InviteRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteStore for InviteRepository {
    async fn find_active_invite(&self, group_id: Uuid) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("find_active_invite");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT code, group_id, created_by, created_at, expires_at, use_count, is_active
            FROM group_invites
            WHERE group_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn find_invite(&self, code: &str) -> Result<Option<Invite>, StoreError> {
        let timer = QueryTimer::new("find_invite_by_code");
        let result = sqlx::query_as::<_, InviteEntity>(
            r#"
            SELECT code, group_id, created_by, created_at, expires_at, use_count, is_active
            FROM group_invites
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<(), StoreError> {
        let timer = QueryTimer::new("insert_invite");
        let result = sqlx::query(
            r#"
            INSERT INTO group_invites (code, group_id, created_by, created_at, expires_at, use_count, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&invite.code)
        .bind(invite.group_id)
        .bind(invite.created_by)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .bind(invite.use_count)
        .bind(invite.is_active)
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        result.map(|_| ()).map_err(store_err)
    }

    async fn deactivate_invites(&self, group_id: Uuid) -> Result<u64, StoreError> {
        let timer = QueryTimer::new("deactivate_invites");
        let result = sqlx::query(
            "UPDATE group_invites SET is_active = FALSE WHERE group_id = $1 AND is_active = TRUE",
        )
        .bind(group_id)
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.rows_affected())
    }

    async fn record_invite_use(&self, code: &str) -> Result<(), StoreError> {
        let timer = QueryTimer::new("record_invite_use");
        let result = sqlx::query("UPDATE group_invites SET use_count = use_count + 1 WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await;
        timer.observe(&result);
        match result.map_err(store_err)?.rows_affected() {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }
}
