//! Storage ports used by the domain services.
//!
//! The PostgreSQL repositories in the persistence crate and the
//! [`InMemoryStore`](crate::memory::InMemoryStore) both implement these.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    Assignment, AssignmentPair, Group, GroupChanges, GroupSummary, Invite, MemberProfile,
    Membership, NewGroup, NewMembership, UserProfile, WishlistItem,
};

/// Groups, memberships and assignments.
///
/// Every write that touches more than one row is atomic.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Inserts the group and the owner's admin membership together.
    async fn create_group(
        &self,
        group: NewGroup,
        owner_profile: MemberProfile,
    ) -> Result<(Group, Membership), StoreError>;

    async fn find_group(&self, group_id: Uuid) -> Result<Option<Group>, StoreError>;

    async fn update_group(&self, group_id: Uuid, changes: &GroupChanges)
        -> Result<Group, StoreError>;

    async fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<GroupSummary>, StoreError>;

    /// Deletes assignments, invites, memberships and then the group.
    async fn delete_group(&self, group_id: Uuid) -> Result<(), StoreError>;

    /// Members ordered by join time.
    async fn list_memberships(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError>;

    async fn find_membership(&self, membership_id: Uuid)
        -> Result<Option<Membership>, StoreError>;

    async fn find_membership_for_user(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    /// Inserts a membership. If the group is drawn, its assignments are
    /// purged and the status reverts to created in the same write.
    ///
    /// Returns [`StoreError::Duplicate`] when the user (or guest email)
    /// is already in the group.
    async fn insert_membership(&self, membership: NewMembership)
        -> Result<Membership, StoreError>;

    /// Removes a membership with the same draw invalidation as insert.
    ///
    /// Under the group lock: fails with [`StoreError::OwnerChanged`] when
    /// `acting_owner` is given and no longer owns the group, and with
    /// [`StoreError::OwnerMembership`] when the membership is the owner's.
    async fn delete_membership(
        &self,
        group_id: Uuid,
        membership_id: Uuid,
        acting_owner: Option<Uuid>,
    ) -> Result<(), StoreError>;

    /// Moves the admin flag from one membership to another, then points
    /// `owner_id` at the new owner.
    ///
    /// Fails with [`StoreError::OwnerChanged`] if `expected_owner_id` no
    /// longer owns the group once it is locked.
    async fn transfer_ownership(
        &self,
        group_id: Uuid,
        expected_owner_id: Uuid,
        from_membership_id: Uuid,
        to_membership_id: Uuid,
        new_owner_id: Uuid,
    ) -> Result<Group, StoreError>;

    /// Replaces the whole assignment set and marks the group drawn.
    ///
    /// Holds a per-group lock for the duration. Fails with
    /// [`StoreError::OwnerChanged`] if `expected_owner_id` no longer owns
    /// the group, or [`StoreError::MembershipChanged`] if the current member
    /// ids differ from `expected_members`. Either way the previous state is
    /// left untouched.
    async fn replace_assignments(
        &self,
        group_id: Uuid,
        expected_owner_id: Uuid,
        expected_members: &[Uuid],
        pairs: &[AssignmentPair],
    ) -> Result<Group, StoreError>;

    async fn find_assignment_for_giver(
        &self,
        group_id: Uuid,
        giver_membership_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError>;

    async fn list_assignments(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError>;

    /// Rewrites the cached display fields of every membership of `user_id`.
    /// Returns the number of memberships updated.
    async fn sync_member_profile(
        &self,
        user_id: Uuid,
        profile: &MemberProfile,
    ) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Invite codes.
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn find_active_invite(&self, group_id: Uuid) -> Result<Option<Invite>, StoreError>;

    async fn find_invite(&self, code: &str) -> Result<Option<Invite>, StoreError>;

    /// Returns [`StoreError::Duplicate`] on a code collision or when the
    /// group already has an active invite.
    async fn insert_invite(&self, invite: &Invite) -> Result<(), StoreError>;

    /// Deactivates every active invite of the group. Returns how many.
    async fn deactivate_invites(&self, group_id: Uuid) -> Result<u64, StoreError>;

    async fn record_invite_use(&self, code: &str) -> Result<(), StoreError>;
}

/// Read access to the external profile store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    /// Case-insensitive lookup by handle without the leading `@`.
    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<UserProfile>, StoreError>;
}

/// Read access to the external wishlist store.
#[async_trait]
pub trait WishlistReader: Send + Sync {
    async fn list_wishlist(&self, user_id: Uuid, limit: usize)
        -> Result<Vec<WishlistItem>, StoreError>;
}
