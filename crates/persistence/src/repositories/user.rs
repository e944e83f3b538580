//! Read access to user profiles and wishlists.
//!
//! Both tables are owned by the profile service; this crate never writes them.

use async_trait::async_trait;
use domain::errors::StoreError;
use domain::models::{UserProfile, WishlistItem};
use domain::store::{UserDirectory, WishlistReader};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{UserEntity, WishlistItemEntity};
use crate::metrics::QueryTimer;
use crate::repositories::store_err;

/// Repository for user profile lookups.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, display_name, handle, avatar, frame
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<UserProfile>, StoreError> {
        let timer = QueryTimer::new("find_user_by_handle");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, display_name, handle, avatar, frame
            FROM users
            WHERE LOWER(handle) = LOWER($1)
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }
}

#[async_trait]
impl WishlistReader for UserRepository {
    async fn list_wishlist(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WishlistItem>, StoreError> {
        let timer = QueryTimer::new("list_wishlist");
        let result = sqlx::query_as::<_, WishlistItemEntity>(
            r#"
            SELECT id, name, description, price, link
            FROM wishlist_items
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result
            .map_err(store_err)?
            .into_iter()
            .map(Into::into)
            .collect())
    }
}
