//! Invite entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Invite;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the group_invites table.
#[derive(Debug, Clone, FromRow)]
pub struct InviteEntity {
    pub code: String,
    pub group_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub use_count: i32,
    pub is_active: bool,
}

impl From<InviteEntity> for Invite {
    fn from(entity: InviteEntity) -> Self {
        Self {
            code: entity.code,
            group_id: entity.group_id,
            created_by: entity.created_by,
            created_at: entity.created_at,
            expires_at: entity.expires_at,
            use_count: entity.use_count,
            is_active: entity.is_active,
        }
    }
}
