//! Draw result models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::group::GroupStatus;
use super::membership::Membership;
use super::user::WishlistItem;

/// One giver -> receiver pair, keyed by (group, giver membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Assignment {
    pub group_id: Uuid,
    pub giver_membership_id: Uuid,
    pub receiver_membership_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Pair produced by the derangement before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentPair {
    pub giver: Uuid,
    pub receiver: Uuid,
}

/// Result returned to the owner after a draw. Contains no pairs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DrawSummary {
    pub group_id: Uuid,
    pub status: GroupStatus,
    pub participant_count: usize,
    pub drawn_at: Option<DateTime<Utc>>,
}

/// The caller's own match, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MyAssignment {
    pub group_id: Uuid,
    pub status: GroupStatus,
    /// None when no draw exists or the caller is not a participant.
    pub receiver: Option<Membership>,
}

/// The caller's match together with their wishlist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MatchWishlist {
    pub receiver: Membership,
    pub items: Vec<WishlistItem>,
}
