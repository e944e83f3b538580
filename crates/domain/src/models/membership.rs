//! Membership (participant) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::GroupError;

/// Display fields copied from the user's profile.
///
/// These are a denormalised projection and are rewritten whenever the
/// profile changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemberProfile {
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub frame: Option<String>,
}

impl MemberProfile {
    pub fn guest(name: &str) -> Self {
        Self {
            display_name: name.trim().to_string(),
            handle: None,
            avatar: None,
            frame: None,
        }
    }
}

/// A participant of one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Membership {
    pub id: Uuid,
    pub group_id: Uuid,
    /// None for guest participants without an account.
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_email: Option<String>,
    /// Cached view of `group.owner_id == user_id`.
    pub is_admin: bool,
    #[serde(flatten)]
    pub profile: MemberProfile,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Data needed to insert a membership row.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub group_id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub is_admin: bool,
    pub profile: MemberProfile,
}

/// Who is being added to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRef {
    /// A registered user by id.
    User(Uuid),
    /// A registered user by `@handle`.
    Handle(String),
    /// A participant without an account.
    Guest { name: String, email: Option<String> },
}

/// Request payload for adding a member. Exactly one form must be given.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct AddMemberRequest {
    pub user_id: Option<Uuid>,

    #[validate(custom(function = "shared::validation::validate_handle"))]
    pub handle: Option<String>,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Guest name must be between 1 and 100 characters"
    ))]
    pub guest_name: Option<String>,

    #[validate(custom(function = "shared::validation::validate_guest_email"))]
    pub guest_email: Option<String>,
}

impl AddMemberRequest {
    pub fn into_member_ref(self) -> Result<MemberRef, GroupError> {
        match (self.user_id, self.handle, self.guest_name) {
            (Some(user_id), None, None) => Ok(MemberRef::User(user_id)),
            (None, Some(handle), None) => Ok(MemberRef::Handle(handle)),
            (None, None, Some(name)) if !name.trim().is_empty() => Ok(MemberRef::Guest {
                name,
                email: self.guest_email,
            }),
            _ => Err(GroupError::Validation(
                "Provide exactly one of user_id, handle or guest_name".to_string(),
            )),
        }
    }
}

/// Request payload for inviting a registered user directly.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct DirectInviteRequest {
    #[validate(custom(function = "shared::validation::validate_handle"))]
    pub handle: String,
}

/// Request payload for transferring ownership.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferOwnershipRequest {
    pub new_owner_id: Uuid,
}
