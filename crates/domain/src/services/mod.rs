//! Domain services for the gift exchange.
//!
//! Services hold their storage ports behind `Arc<dyn ...>` and are built
//! once at startup.

pub mod draw;
pub mod group;
pub mod invitation;
pub mod membership;
pub mod notification;
pub mod profile_sync;

pub use draw::{derange, is_derangement, Derangement, DrawConfig, DrawEngine};
pub use group::GroupService;
pub use invitation::{InvitationConfig, InvitationService};
pub use membership::{MembershipConfig, MembershipManager};
pub use notification::{
    notify_best_effort, GroupEvent, NotificationError, NotificationKind, NotificationSink,
    RecordingNotificationSink,
};
pub use profile_sync::{profile_channel, ProfileSync};

use uuid::Uuid;

use crate::errors::{GroupError, GroupResult};
use crate::models::{Group, Membership};
use crate::store::GroupStore;

pub(crate) async fn load_group(store: &dyn GroupStore, group_id: Uuid) -> GroupResult<Group> {
    store
        .find_group(group_id)
        .await?
        .ok_or_else(|| GroupError::NotFound("Group".to_string()))
}

pub(crate) fn require_owner(group: &Group, caller_id: Uuid, action: &str) -> GroupResult<()> {
    if group.is_owner(caller_id) {
        Ok(())
    } else {
        Err(GroupError::owner_only(action))
    }
}

pub(crate) async fn require_member(
    store: &dyn GroupStore,
    group_id: Uuid,
    caller_id: Uuid,
) -> GroupResult<Membership> {
    store
        .find_membership_for_user(group_id, caller_id)
        .await?
        .ok_or_else(GroupError::not_a_member)
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    use super::*;
    use crate::errors::StoreError;
    use crate::memory::InMemoryStore;
    use crate::models::{
        Assignment, AssignmentPair, CreateGroupRequest, GroupChanges, GroupSummary,
        MemberProfile, NewGroup, NewMembership,
    };

    pub struct Fixture {
        pub store: Arc<InMemoryStore>,
        pub sink: Arc<RecordingNotificationSink>,
        pub groups: GroupService,
        pub members: Arc<MembershipManager>,
        pub invites: InvitationService,
        pub draw: DrawEngine,
        /// "Ana", handle "ana".
        pub owner: Uuid,
        /// One user per extra name, already joined, handle = lowercase name.
        pub users: Vec<Uuid>,
        pub group: Group,
    }

    pub async fn fixture(names: &[&str]) -> Fixture {
        fixture_with(
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingNotificationSink::new()),
            names,
        )
        .await
    }

    pub async fn fixture_with(
        store: Arc<InMemoryStore>,
        sink: Arc<RecordingNotificationSink>,
        names: &[&str],
    ) -> Fixture {
        let groups = GroupService::new(store.clone(), store.clone());
        let members = Arc::new(MembershipManager::new(
            store.clone(),
            store.clone(),
            sink.clone(),
            MembershipConfig::default(),
        ));
        let invites = InvitationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            members.clone(),
            sink.clone(),
            InvitationConfig::default(),
        );
        let draw = DrawEngine::new(store.clone(), store.clone(), sink.clone(), DrawConfig::default());

        let owner = store.insert_user("Ana", Some("ana")).await;
        let group = groups
            .create_group(
                owner,
                CreateGroupRequest {
                    name: "Amigo Secreto".to_string(),
                    description: None,
                    event_date: None,
                    max_price: rust_decimal::Decimal::new(100, 0),
                },
            )
            .await
            .expect("fixture group")
            .group;

        let mut users = Vec::new();
        for name in names {
            let user = store.insert_user(name, Some(&name.to_lowercase())).await;
            members.join(group.id, user).await.expect("fixture join");
            users.push(user);
        }

        Fixture {
            store,
            sink,
            groups,
            members,
            invites,
            draw,
            owner,
            users,
            group,
        }
    }

    /// Commits an ownership transfer right before the next draw write or
    /// membership delete, as a concurrent request would.
    pub struct TransferBeforeWrite {
        pub inner: Arc<InMemoryStore>,
        new_owner: Mutex<Option<Uuid>>,
    }

    impl TransferBeforeWrite {
        pub fn new(inner: Arc<InMemoryStore>, new_owner: Uuid) -> Self {
            Self {
                inner,
                new_owner: Mutex::new(Some(new_owner)),
            }
        }

        async fn interleave(&self, group_id: Uuid) {
            let pending = self.new_owner.lock().unwrap().take();
            let Some(new_owner) = pending else { return };
            let group = self.inner.find_group(group_id).await.unwrap().unwrap();
            let from = self
                .inner
                .find_membership_for_user(group_id, group.owner_id)
                .await
                .unwrap()
                .unwrap();
            let to = self
                .inner
                .find_membership_for_user(group_id, new_owner)
                .await
                .unwrap()
                .unwrap();
            self.inner
                .transfer_ownership(group_id, group.owner_id, from.id, to.id, new_owner)
                .await
                .unwrap();
        }
    }

    #[async_trait]
    impl GroupStore for TransferBeforeWrite {
        async fn create_group(
            &self,
            group: NewGroup,
            owner_profile: MemberProfile,
        ) -> Result<(Group, Membership), StoreError> {
            self.inner.create_group(group, owner_profile).await
        }

        async fn find_group(&self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
            self.inner.find_group(group_id).await
        }

        async fn update_group(
            &self,
            group_id: Uuid,
            changes: &GroupChanges,
        ) -> Result<Group, StoreError> {
            self.inner.update_group(group_id, changes).await
        }

        async fn list_groups_for_user(
            &self,
            user_id: Uuid,
        ) -> Result<Vec<GroupSummary>, StoreError> {
            self.inner.list_groups_for_user(user_id).await
        }

        async fn delete_group(&self, group_id: Uuid) -> Result<(), StoreError> {
            self.inner.delete_group(group_id).await
        }

        async fn list_memberships(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError> {
            self.inner.list_memberships(group_id).await
        }

        async fn find_membership(
            &self,
            membership_id: Uuid,
        ) -> Result<Option<Membership>, StoreError> {
            self.inner.find_membership(membership_id).await
        }

        async fn find_membership_for_user(
            &self,
            group_id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<Membership>, StoreError> {
            self.inner.find_membership_for_user(group_id, user_id).await
        }

        async fn insert_membership(
            &self,
            membership: NewMembership,
        ) -> Result<Membership, StoreError> {
            self.inner.insert_membership(membership).await
        }

        async fn delete_membership(
            &self,
            group_id: Uuid,
            membership_id: Uuid,
            acting_owner: Option<Uuid>,
        ) -> Result<(), StoreError> {
            self.interleave(group_id).await;
            self.inner
                .delete_membership(group_id, membership_id, acting_owner)
                .await
        }

        async fn transfer_ownership(
            &self,
            group_id: Uuid,
            expected_owner_id: Uuid,
            from_membership_id: Uuid,
            to_membership_id: Uuid,
            new_owner_id: Uuid,
        ) -> Result<Group, StoreError> {
            self.inner
                .transfer_ownership(
                    group_id,
                    expected_owner_id,
                    from_membership_id,
                    to_membership_id,
                    new_owner_id,
                )
                .await
        }

        async fn replace_assignments(
            &self,
            group_id: Uuid,
            expected_owner_id: Uuid,
            expected_members: &[Uuid],
            pairs: &[AssignmentPair],
        ) -> Result<Group, StoreError> {
            self.interleave(group_id).await;
            self.inner
                .replace_assignments(group_id, expected_owner_id, expected_members, pairs)
                .await
        }

        async fn find_assignment_for_giver(
            &self,
            group_id: Uuid,
            giver_membership_id: Uuid,
        ) -> Result<Option<Assignment>, StoreError> {
            self.inner
                .find_assignment_for_giver(group_id, giver_membership_id)
                .await
        }

        async fn list_assignments(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
            self.inner.list_assignments(group_id).await
        }

        async fn sync_member_profile(
            &self,
            user_id: Uuid,
            profile: &MemberProfile,
        ) -> Result<u64, StoreError> {
            self.inner.sync_member_profile(user_id, profile).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }
}
