//! Draw assignment entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Assignment;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the draw_assignments table.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentEntity {
    pub group_id: Uuid,
    pub giver_membership_id: Uuid,
    pub receiver_membership_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<AssignmentEntity> for Assignment {
    fn from(entity: AssignmentEntity) -> Self {
        Self {
            group_id: entity.group_id,
            giver_membership_id: entity.giver_membership_id,
            receiver_membership_id: entity.receiver_membership_id,
            created_at: entity.created_at,
        }
    }
}
