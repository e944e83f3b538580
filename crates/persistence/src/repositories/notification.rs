//! Notification feed writes.

use async_trait::async_trait;
use domain::services::{GroupEvent, NotificationError, NotificationSink};
use sqlx::PgPool;
use uuid::Uuid;

use crate::metrics::QueryTimer;

/// Appends group events to the user notification feed.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for NotificationRepository {
    async fn deliver(&self, user_id: Uuid, event: &GroupEvent) -> Result<(), NotificationError> {
        let timer = QueryTimer::new("insert_notification");
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, title, message, data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(event.kind().as_str())
        .bind(event.title())
        .bind(event.message())
        .bind(event.data())
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        result
            .map(|_| ())
            .map_err(|e| NotificationError(e.to_string()))
    }
}
