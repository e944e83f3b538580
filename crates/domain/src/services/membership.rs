//! Membership lifecycle: add, join, remove, leave, transfer and delete.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{GroupError, GroupResult, StoreError};
use crate::models::{Group, MemberProfile, MemberRef, Membership, NewMembership};
use crate::services::notification::{notify_best_effort, GroupEvent, NotificationSink};
use crate::services::{load_group, require_member, require_owner};
use crate::store::{GroupStore, UserDirectory};

pub const DEFAULT_MAX_MEMBERS_PER_GROUP: usize = 100;

/// Tunables for membership changes.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub max_members_per_group: usize,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            max_members_per_group: DEFAULT_MAX_MEMBERS_PER_GROUP,
        }
    }
}

pub struct MembershipManager {
    groups: Arc<dyn GroupStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationSink>,
    config: MembershipConfig,
}

impl MembershipManager {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSink>,
        config: MembershipConfig,
    ) -> Self {
        Self {
            groups,
            users,
            notifier,
            config,
        }
    }

    /// Adds a participant on the owner's behalf.
    ///
    /// Strict: fails with `AlreadyMember` if the user is already in the group.
    pub async fn add_member(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
        member: MemberRef,
    ) -> GroupResult<Membership> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "add members")?;

        let new_member = self.resolve(&group, member).await?;
        if let Some(user_id) = new_member.user_id {
            if self
                .groups
                .find_membership_for_user(group_id, user_id)
                .await?
                .is_some()
            {
                return Err(GroupError::AlreadyMember);
            }
        }

        let membership = self.insert(&group, new_member).await?;
        info!(
            group_id = %group_id,
            user_id = %caller_id,
            membership_id = %membership.id,
            guest = membership.is_guest(),
            "Member added"
        );
        Ok(membership)
    }

    /// Adds the caller to the group, or returns their existing membership.
    ///
    /// The flag is true when the caller was already a member.
    pub async fn join(&self, group_id: Uuid, user_id: Uuid) -> GroupResult<(Membership, bool)> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        if let Some(existing) = self
            .groups
            .find_membership_for_user(group_id, user_id)
            .await?
        {
            return Ok((existing, true));
        }

        let new_member = self.resolve(&group, MemberRef::User(user_id)).await?;
        match self.insert(&group, new_member).await {
            Ok(membership) => {
                info!(group_id = %group_id, user_id = %user_id, "Joined group");
                Ok((membership, false))
            }
            // Lost a race with a concurrent join of the same user.
            Err(GroupError::AlreadyMember) => self
                .groups
                .find_membership_for_user(group_id, user_id)
                .await?
                .map(|existing| (existing, true))
                .ok_or(GroupError::AlreadyMember),
            Err(e) => Err(e),
        }
    }

    /// Removes another member. Owner only; the owner cannot be removed.
    pub async fn remove_member(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
        membership_id: Uuid,
    ) -> GroupResult<()> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "remove members")?;

        let target = self
            .groups
            .find_membership(membership_id)
            .await?
            .filter(|m| m.group_id == group_id)
            .ok_or_else(|| GroupError::NotFound("Member".to_string()))?;
        if target.belongs_to(group.owner_id) {
            return Err(GroupError::CannotRemoveOwner);
        }

        self.groups
            .delete_membership(group_id, target.id, Some(caller_id))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => GroupError::NotFound("Member".to_string()),
                StoreError::OwnerChanged => GroupError::owner_only("remove members"),
                other => other.into(),
            })?;
        info!(
            group_id = %group_id,
            user_id = %caller_id,
            membership_id = %target.id,
            "Member removed"
        );

        if let Some(user_id) = target.user_id {
            notify_best_effort(
                self.notifier.as_ref(),
                user_id,
                GroupEvent::RemovedFromGroup {
                    group_id,
                    group_name: group.name.clone(),
                },
            )
            .await;
        }
        Ok(())
    }

    /// Removes the caller's own membership. Not allowed for the owner.
    pub async fn leave_group(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<()> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        if group.is_owner(caller_id) {
            return Err(GroupError::OwnerCannotLeave);
        }
        let membership = require_member(self.groups.as_ref(), group_id, caller_id).await?;

        self.groups
            .delete_membership(group_id, membership.id, None)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => GroupError::NotFound("Member".to_string()),
                // Became the owner after the check above.
                StoreError::OwnerMembership => GroupError::OwnerCannotLeave,
                other => other.into(),
            })?;
        info!(group_id = %group_id, user_id = %caller_id, "Left group");
        Ok(())
    }

    /// Hands ownership to another current member. Owner only.
    pub async fn transfer_ownership(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
        new_owner_id: Uuid,
    ) -> GroupResult<Group> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "transfer ownership")?;
        if new_owner_id == caller_id {
            return Ok(group);
        }

        let target = self
            .groups
            .find_membership_for_user(group_id, new_owner_id)
            .await?
            .ok_or_else(|| GroupError::NotFound("Member".to_string()))?;
        let current = require_member(self.groups.as_ref(), group_id, caller_id).await?;

        let updated = self
            .groups
            .transfer_ownership(group_id, caller_id, current.id, target.id, new_owner_id)
            .await
            .map_err(|e| match e {
                StoreError::OwnerChanged => GroupError::owner_only("transfer ownership"),
                other => other.into(),
            })?;
        info!(
            group_id = %group_id,
            user_id = %caller_id,
            new_owner_id = %new_owner_id,
            "Ownership transferred"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            new_owner_id,
            GroupEvent::OwnershipTransferred {
                group_id,
                group_name: updated.name.clone(),
            },
        )
        .await;
        Ok(updated)
    }

    /// Deletes the group with its memberships, assignments and invites.
    pub async fn delete_group(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<()> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "delete the group")?;

        let former_members = self.groups.list_memberships(group_id).await?;
        self.groups.delete_group(group_id).await.map_err(|e| match e {
            StoreError::NotFound => GroupError::NotFound("Group".to_string()),
            other => other.into(),
        })?;
        info!(
            group_id = %group_id,
            user_id = %caller_id,
            members = former_members.len(),
            "Group deleted"
        );

        for user_id in former_members
            .iter()
            .filter_map(|m| m.user_id)
            .filter(|id| *id != group.owner_id)
        {
            notify_best_effort(
                self.notifier.as_ref(),
                user_id,
                GroupEvent::GroupDeleted {
                    group_id,
                    group_name: group.name.clone(),
                },
            )
            .await;
        }
        Ok(())
    }

    /// Members of the group, visible to members only.
    pub async fn list_members(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<Vec<Membership>> {
        load_group(self.groups.as_ref(), group_id).await?;
        require_member(self.groups.as_ref(), group_id, caller_id).await?;
        Ok(self.groups.list_memberships(group_id).await?)
    }

    async fn resolve(&self, group: &Group, member: MemberRef) -> GroupResult<NewMembership> {
        let (user_id, guest_email, profile) = match member {
            MemberRef::User(user_id) => {
                let user = self
                    .users
                    .find_user(user_id)
                    .await?
                    .ok_or_else(|| GroupError::NotFound("User".to_string()))?;
                (Some(user.id), None, user.member_profile())
            }
            MemberRef::Handle(handle) => {
                let handle = shared::validation::normalize_handle(&handle);
                let user = self
                    .users
                    .find_user_by_handle(&handle)
                    .await?
                    .ok_or_else(|| GroupError::NotFound(format!("User @{}", handle)))?;
                (Some(user.id), None, user.member_profile())
            }
            MemberRef::Guest { name, email } => (
                None,
                email
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty()),
                MemberProfile::guest(&name),
            ),
        };

        Ok(NewMembership {
            group_id: group.id,
            is_admin: user_id == Some(group.owner_id),
            user_id,
            guest_email,
            profile,
        })
    }

    async fn insert(&self, group: &Group, new_member: NewMembership) -> GroupResult<Membership> {
        let count = self.groups.list_memberships(group.id).await?.len();
        if count >= self.config.max_members_per_group {
            return Err(GroupError::Validation(format!(
                "Group is full ({} members max)",
                self.config.max_members_per_group
            )));
        }

        self.groups
            .insert_membership(new_member)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => GroupError::AlreadyMember,
                StoreError::NotFound => GroupError::NotFound("Group".to_string()),
                other => other.into(),
            })
    }
}
