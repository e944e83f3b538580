//! Group entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{GroupStatus, GroupSummary};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for group_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "group_status", rename_all = "lowercase")]
pub enum GroupStatusDb {
    Created,
    Drawn,
}

impl From<GroupStatusDb> for GroupStatus {
    fn from(db_status: GroupStatusDb) -> Self {
        match db_status {
            GroupStatusDb::Created => GroupStatus::Created,
            GroupStatusDb::Drawn => GroupStatus::Drawn,
        }
    }
}

impl From<GroupStatus> for GroupStatusDb {
    fn from(status: GroupStatus) -> Self {
        match status {
            GroupStatus::Created => GroupStatusDb::Created,
            GroupStatus::Drawn => GroupStatusDb::Drawn,
        }
    }
}

/// Database row mapping for the groups table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub max_price: Decimal,
    pub owner_id: Uuid,
    pub status: GroupStatusDb,
    pub drawn_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GroupEntity> for domain::models::Group {
    fn from(entity: GroupEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            event_date: entity.event_date,
            max_price: entity.max_price,
            owner_id: entity.owner_id,
            status: entity.status.into(),
            drawn_at: entity.drawn_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// A group joined with the caller's role and the member count.
#[derive(Debug, Clone, FromRow)]
pub struct GroupSummaryEntity {
    pub id: Uuid,
    pub name: String,
    pub event_date: Option<NaiveDate>,
    pub max_price: Decimal,
    pub status: GroupStatusDb,
    pub member_count: i64,
    pub is_owner: bool,
}

impl From<GroupSummaryEntity> for GroupSummary {
    fn from(entity: GroupSummaryEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            event_date: entity.event_date,
            max_price: entity.max_price,
            status: entity.status.into(),
            member_count: entity.member_count,
            is_owner: entity.is_owner,
        }
    }
}
