//! Membership entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{MemberProfile, Membership};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the group_memberships table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub is_admin: bool,
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub frame: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl From<MembershipEntity> for Membership {
    fn from(entity: MembershipEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            user_id: entity.user_id,
            guest_email: entity.guest_email,
            is_admin: entity.is_admin,
            profile: MemberProfile {
                display_name: entity.display_name,
                handle: entity.handle,
                avatar: entity.avatar,
                frame: entity.frame,
            },
            joined_at: entity.joined_at,
        }
    }
}
