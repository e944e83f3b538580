//! Group create/read/update.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{GroupError, GroupResult};
use crate::models::{
    CreateGroupRequest, Group, GroupChanges, GroupDetail, GroupSummary, UpdateGroupRequest,
};
use crate::services::{load_group, require_member, require_owner};
use crate::store::{GroupStore, UserDirectory};

pub struct GroupService {
    groups: Arc<dyn GroupStore>,
    users: Arc<dyn UserDirectory>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { groups, users }
    }

    /// Creates a group owned by the caller, who becomes its first admin member.
    pub async fn create_group(
        &self,
        caller_id: Uuid,
        request: CreateGroupRequest,
    ) -> GroupResult<GroupDetail> {
        request
            .validate()
            .map_err(|e| GroupError::Validation(e.to_string()))?;

        let owner = self
            .users
            .find_user(caller_id)
            .await?
            .ok_or_else(|| GroupError::NotFound("User".to_string()))?;

        let (group, membership) = self
            .groups
            .create_group(request.into_new_group(caller_id), owner.member_profile())
            .await?;
        info!(group_id = %group.id, user_id = %caller_id, "Group created");

        Ok(GroupDetail {
            my_membership_id: membership.id,
            members: vec![membership],
            is_owner: true,
            group,
        })
    }

    /// Group with its member list, for members only.
    pub async fn get_group(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<GroupDetail> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        let mine = require_member(self.groups.as_ref(), group_id, caller_id).await?;
        let members = self.groups.list_memberships(group_id).await?;

        Ok(GroupDetail {
            is_owner: group.is_owner(caller_id),
            my_membership_id: mine.id,
            members,
            group,
        })
    }

    pub async fn list_groups(&self, caller_id: Uuid) -> GroupResult<Vec<GroupSummary>> {
        Ok(self.groups.list_groups_for_user(caller_id).await?)
    }

    /// Updates name, description, event date or price ceiling. Owner only.
    pub async fn update_group(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
        request: UpdateGroupRequest,
    ) -> GroupResult<Group> {
        request
            .validate()
            .map_err(|e| GroupError::Validation(e.to_string()))?;

        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "edit the group")?;

        let changes = GroupChanges::from(request);
        if changes.is_empty() {
            return Ok(group);
        }

        let updated = self.groups.update_group(group_id, &changes).await?;
        info!(group_id = %group_id, user_id = %caller_id, "Group updated");
        Ok(updated)
    }
}
