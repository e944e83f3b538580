//! Invite codes: issue, resolve, accept, direct invites and revocation.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{GroupError, GroupResult, StoreError};
use crate::models::{AcceptedInvite, Invite, InviteInfo};
use crate::services::membership::MembershipManager;
use crate::services::notification::{notify_best_effort, GroupEvent, NotificationSink};
use crate::services::{load_group, require_member, require_owner};
use crate::store::{GroupStore, InviteStore, UserDirectory};

/// Attempts at finding an unused code before giving up.
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct InvitationConfig {
    /// Lifetime of new codes. None keeps them valid until revoked.
    pub ttl: Option<Duration>,
}

pub struct InvitationService {
    groups: Arc<dyn GroupStore>,
    invites: Arc<dyn InviteStore>,
    users: Arc<dyn UserDirectory>,
    members: Arc<MembershipManager>,
    notifier: Arc<dyn NotificationSink>,
    config: InvitationConfig,
}

impl InvitationService {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        invites: Arc<dyn InviteStore>,
        users: Arc<dyn UserDirectory>,
        members: Arc<MembershipManager>,
        notifier: Arc<dyn NotificationSink>,
        config: InvitationConfig,
    ) -> Self {
        Self {
            groups,
            invites,
            users,
            members,
            notifier,
            config,
        }
    }

    /// Returns the group's active code, minting one if there is none.
    ///
    /// Any member may ask for the code.
    pub async fn create_invite(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<Invite> {
        load_group(self.groups.as_ref(), group_id).await?;
        require_member(self.groups.as_ref(), group_id, caller_id).await?;
        self.ensure_invite(group_id, caller_id).await
    }

    /// Public preview of an invite.
    pub async fn resolve_invite(&self, code: &str) -> GroupResult<InviteInfo> {
        let invite = self.usable_invite(code).await?;
        let group = self
            .groups
            .find_group(invite.group_id)
            .await?
            .ok_or(GroupError::InviteNotFound)?;

        let members = self.groups.list_memberships(group.id).await?;
        let owner = members.iter().find(|m| m.belongs_to(group.owner_id));

        Ok(InviteInfo {
            code: invite.code,
            group_id: group.id,
            group_name: group.name,
            owner_name: owner
                .map(|m| m.profile.display_name.clone())
                .unwrap_or_default(),
            owner_handle: owner.and_then(|m| m.profile.handle.clone()),
            member_count: members.len(),
            expires_at: invite.expires_at,
        })
    }

    /// Joins the caller to the invite's group. Accepting twice is a no-op.
    pub async fn accept_invite(&self, code: &str, caller_id: Uuid) -> GroupResult<AcceptedInvite> {
        let invite = self.usable_invite(code).await?;
        let (membership, already_member) = self
            .members
            .join(invite.group_id, caller_id)
            .await
            .map_err(|e| match e {
                GroupError::NotFound(ref what) if what == "Group" => GroupError::InviteNotFound,
                other => other,
            })?;

        if !already_member {
            if let Err(e) = self.invites.record_invite_use(&invite.code).await {
                warn!(code = %invite.code, error = %e, "Failed to record invite use");
            }
            info!(
                group_id = %invite.group_id,
                user_id = %caller_id,
                "Invite accepted"
            );
        }

        Ok(AcceptedInvite {
            group_id: invite.group_id,
            membership,
            already_member,
        })
    }

    /// Sends the group's code to a registered user found by handle.
    pub async fn invite_user(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
        handle: &str,
    ) -> GroupResult<Invite> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        let inviter = require_member(self.groups.as_ref(), group_id, caller_id).await?;

        let handle = shared::validation::normalize_handle(handle);
        let target = self
            .users
            .find_user_by_handle(&handle)
            .await?
            .ok_or_else(|| GroupError::NotFound(format!("User @{}", handle)))?;
        if self
            .groups
            .find_membership_for_user(group_id, target.id)
            .await?
            .is_some()
        {
            return Err(GroupError::AlreadyMember);
        }

        let invite = self.ensure_invite(group_id, caller_id).await?;
        notify_best_effort(
            self.notifier.as_ref(),
            target.id,
            GroupEvent::InviteSent {
                group_id,
                group_name: group.name,
                invite_code: invite.code.clone(),
                invited_by: inviter.profile.display_name,
            },
        )
        .await;
        info!(
            group_id = %group_id,
            user_id = %caller_id,
            invited_user_id = %target.id,
            "Direct invite sent"
        );
        Ok(invite)
    }

    /// Invalidates the active code. Owner only. The next request mints a new one.
    pub async fn revoke_invite(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<u64> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "revoke invites")?;

        let revoked = self.invites.deactivate_invites(group_id).await?;
        info!(group_id = %group_id, user_id = %caller_id, revoked, "Invites revoked");
        Ok(revoked)
    }

    async fn ensure_invite(&self, group_id: Uuid, created_by: Uuid) -> GroupResult<Invite> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            if let Some(active) = self.invites.find_active_invite(group_id).await? {
                if active.is_usable_at(Utc::now()) {
                    return Ok(active);
                }
                self.invites.deactivate_invites(group_id).await?;
            }

            let expires_at = self.config.ttl.map(|ttl| Utc::now() + ttl);
            let invite = Invite::new(group_id, created_by, expires_at);
            match self.invites.insert_invite(&invite).await {
                Ok(()) => {
                    info!(group_id = %group_id, user_id = %created_by, "Invite created");
                    return Ok(invite);
                }
                // Code collision or a concurrent request created one first.
                Err(StoreError::Duplicate) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(GroupError::TransientStorageFailure(
            "could not allocate a unique invite code".to_string(),
        ))
    }

    async fn usable_invite(&self, code: &str) -> GroupResult<Invite> {
        let code = shared::validation::normalize_invite_code(code);
        if !shared::validation::is_valid_invite_code(&code) {
            return Err(GroupError::InviteNotFound);
        }

        let invite = self
            .invites
            .find_invite(&code)
            .await?
            .ok_or(GroupError::InviteNotFound)?;
        if !invite.is_usable_at(Utc::now()) {
            return Err(GroupError::InviteExpired);
        }
        Ok(invite)
    }
}
