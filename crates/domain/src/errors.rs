//! Domain error types.

use thiserror::Error;

/// Failures reported by group, membership, invite and draw operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("User is already a member of this group")]
    AlreadyMember,

    #[error("At least 2 participants are required for a draw, found {found}")]
    InsufficientParticipants { found: usize },

    #[error("The group owner cannot be removed; transfer ownership or delete the group instead")]
    CannotRemoveOwner,

    #[error("The group owner cannot leave; transfer ownership or delete the group first")]
    OwnerCannotLeave,

    #[error("Invite code not found")]
    InviteNotFound,

    #[error("Invite code is no longer valid")]
    InviteExpired,

    #[error("{0}")]
    Validation(String),

    #[error("Storage temporarily unavailable: {0}")]
    TransientStorageFailure(String),
}

impl GroupError {
    /// Machine readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GroupError::Unauthorized(_) => "forbidden",
            GroupError::NotFound(_) => "not_found",
            GroupError::AlreadyMember => "already_member",
            GroupError::InsufficientParticipants { .. } => "insufficient_participants",
            GroupError::CannotRemoveOwner => "cannot_remove_owner",
            GroupError::OwnerCannotLeave => "owner_cannot_leave",
            GroupError::InviteNotFound => "invite_not_found",
            GroupError::InviteExpired => "invite_expired",
            GroupError::Validation(_) => "validation_error",
            GroupError::TransientStorageFailure(_) => "service_unavailable",
        }
    }

    pub fn owner_only(action: &str) -> Self {
        GroupError::Unauthorized(format!("Only the group owner can {}", action))
    }

    pub fn not_a_member() -> Self {
        GroupError::Unauthorized("You are not a member of this group".to_string())
    }
}

/// Failures returned by storage ports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint rejected the write.
    #[error("duplicate record")]
    Duplicate,

    /// The member set changed between computing and persisting a draw.
    #[error("group membership changed during the draw")]
    MembershipChanged,

    #[error("record not found")]
    NotFound,

    /// A check constraint rejected the row. Retrying cannot succeed.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The group's owner is no longer the one the caller acted as.
    #[error("group owner changed")]
    OwnerChanged,

    /// The membership to delete belongs to the group owner.
    #[error("membership belongs to the group owner")]
    OwnerMembership,
}

impl From<StoreError> for GroupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GroupError::NotFound("Record".to_string()),
            StoreError::Constraint(detail) => GroupError::Validation(detail),
            StoreError::OwnerChanged => {
                GroupError::Unauthorized("Group ownership changed during the request".to_string())
            }
            StoreError::OwnerMembership => GroupError::CannotRemoveOwner,
            other => GroupError::TransientStorageFailure(other.to_string()),
        }
    }
}

pub type GroupResult<T> = Result<T, GroupError>;
