//! In-memory implementation of every storage port.
//!
//! Backs the unit tests and API tests, and local runs without PostgreSQL.
//! A single lock guards all state, so every multi-row write is atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::{
    Assignment, AssignmentPair, Group, GroupChanges, GroupStatus, GroupSummary, Invite,
    MemberProfile, Membership, NewGroup, NewMembership, UserProfile, WishlistItem,
};
use crate::store::{GroupStore, InviteStore, UserDirectory, WishlistReader};

#[derive(Default)]
struct State {
    groups: HashMap<Uuid, Group>,
    /// Insertion order doubles as join order.
    memberships: Vec<Membership>,
    assignments: HashMap<Uuid, Vec<Assignment>>,
    invites: HashMap<String, Invite>,
    users: HashMap<Uuid, UserProfile>,
    wishlists: HashMap<Uuid, Vec<WishlistItem>>,
}

impl State {
    fn members_of(&self, group_id: Uuid) -> impl Iterator<Item = &Membership> {
        self.memberships.iter().filter(move |m| m.group_id == group_id)
    }

    /// Drops the draw of a group whose member set changed.
    fn invalidate_draw(&mut self, group_id: Uuid) {
        self.assignments.remove(&group_id);
        if let Some(group) = self.groups.get_mut(&group_id) {
            if group.status.is_drawn() {
                group.status = GroupStatus::Created;
                group.drawn_at = None;
                group.updated_at = Utc::now();
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    failing_replacements: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user profile and returns its id.
    pub async fn insert_user(&self, display_name: &str, handle: Option<&str>) -> Uuid {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            handle: handle.map(str::to_string),
            avatar: None,
            frame: None,
        };
        let id = profile.id;
        self.state.write().await.users.insert(id, profile);
        id
    }

    pub async fn set_wishlist(&self, user_id: Uuid, items: Vec<WishlistItem>) {
        self.state.write().await.wishlists.insert(user_id, items);
    }

    /// Makes the next `count` draw writes fail as if membership changed.
    pub fn fail_next_replacements(&self, count: u32) {
        self.failing_replacements.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_replacements
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl GroupStore for InMemoryStore {
    async fn create_group(
        &self,
        group: NewGroup,
        owner_profile: MemberProfile,
    ) -> Result<(Group, Membership), StoreError> {
        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            name: group.name,
            description: group.description,
            event_date: group.event_date,
            max_price: group.max_price,
            owner_id: group.owner_id,
            status: GroupStatus::Created,
            drawn_at: None,
            created_at: now,
            updated_at: now,
        };
        let owner = Membership {
            id: Uuid::new_v4(),
            group_id: group.id,
            user_id: Some(group.owner_id),
            guest_email: None,
            is_admin: true,
            profile: owner_profile,
            joined_at: now,
        };

        let mut state = self.state.write().await;
        state.groups.insert(group.id, group.clone());
        state.memberships.push(owner.clone());
        Ok((group, owner))
    }

    async fn find_group(&self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
        Ok(self.state.read().await.groups.get(&group_id).cloned())
    }

    async fn update_group(
        &self,
        group_id: Uuid,
        changes: &GroupChanges,
    ) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        let group = state.groups.get_mut(&group_id).ok_or(StoreError::NotFound)?;
        if let Some(name) = &changes.name {
            group.name = name.clone();
        }
        if let Some(description) = &changes.description {
            group.description = description.clone();
        }
        if let Some(event_date) = changes.event_date {
            group.event_date = Some(event_date);
        }
        if let Some(max_price) = changes.max_price {
            group.max_price = max_price;
        }
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<GroupSummary>, StoreError> {
        let state = self.state.read().await;
        let mut summaries: Vec<GroupSummary> = state
            .memberships
            .iter()
            .filter(|m| m.belongs_to(user_id))
            .filter_map(|m| state.groups.get(&m.group_id))
            .map(|g| GroupSummary {
                id: g.id,
                name: g.name.clone(),
                event_date: g.event_date,
                max_price: g.max_price,
                status: g.status,
                member_count: state.members_of(g.id).count() as i64,
                is_owner: g.owner_id == user_id,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.assignments.remove(&group_id);
        state.invites.retain(|_, invite| invite.group_id != group_id);
        state.memberships.retain(|m| m.group_id != group_id);
        state
            .groups
            .remove(&group_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_memberships(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        Ok(self.state.read().await.members_of(group_id).cloned().collect())
    }

    async fn find_membership(
        &self,
        membership_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .iter()
            .find(|m| m.id == membership_id)
            .cloned())
    }

    async fn find_membership_for_user(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .members_of(group_id)
            .find(|m| m.belongs_to(user_id))
            .cloned())
    }

    async fn insert_membership(
        &self,
        membership: NewMembership,
    ) -> Result<Membership, StoreError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&membership.group_id) {
            return Err(StoreError::NotFound);
        }
        let duplicate = state.members_of(membership.group_id).any(|m| {
            (membership.user_id.is_some() && m.user_id == membership.user_id)
                || (membership.guest_email.is_some() && m.guest_email == membership.guest_email)
        });
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        let created = Membership {
            id: Uuid::new_v4(),
            group_id: membership.group_id,
            user_id: membership.user_id,
            guest_email: membership.guest_email,
            is_admin: membership.is_admin,
            profile: membership.profile,
            joined_at: Utc::now(),
        };
        state.memberships.push(created.clone());
        state.invalidate_draw(created.group_id);
        Ok(created)
    }

    async fn delete_membership(
        &self,
        group_id: Uuid,
        membership_id: Uuid,
        acting_owner: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let owner_id = state
            .groups
            .get(&group_id)
            .map(|g| g.owner_id)
            .ok_or(StoreError::NotFound)?;
        if acting_owner.is_some_and(|acting| acting != owner_id) {
            return Err(StoreError::OwnerChanged);
        }
        let target = state
            .memberships
            .iter()
            .find(|m| m.id == membership_id && m.group_id == group_id)
            .ok_or(StoreError::NotFound)?;
        if target.belongs_to(owner_id) {
            return Err(StoreError::OwnerMembership);
        }

        state
            .memberships
            .retain(|m| !(m.id == membership_id && m.group_id == group_id));
        state.invalidate_draw(group_id);
        Ok(())
    }

    async fn transfer_ownership(
        &self,
        group_id: Uuid,
        expected_owner_id: Uuid,
        from_membership_id: Uuid,
        to_membership_id: Uuid,
        new_owner_id: Uuid,
    ) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        match state.groups.get(&group_id) {
            None => return Err(StoreError::NotFound),
            Some(group) if group.owner_id != expected_owner_id => {
                return Err(StoreError::OwnerChanged)
            }
            Some(_) => {}
        }
        for membership in state
            .memberships
            .iter_mut()
            .filter(|m| m.group_id == group_id)
        {
            if membership.id == from_membership_id {
                membership.is_admin = false;
            } else if membership.id == to_membership_id {
                membership.is_admin = true;
            }
        }
        let group = state.groups.get_mut(&group_id).ok_or(StoreError::NotFound)?;
        group.owner_id = new_owner_id;
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn replace_assignments(
        &self,
        group_id: Uuid,
        expected_owner_id: Uuid,
        expected_members: &[Uuid],
        pairs: &[AssignmentPair],
    ) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        match state.groups.get(&group_id) {
            None => return Err(StoreError::NotFound),
            Some(group) if group.owner_id != expected_owner_id => {
                return Err(StoreError::OwnerChanged)
            }
            Some(_) => {}
        }

        let current: HashSet<Uuid> = state.members_of(group_id).map(|m| m.id).collect();
        let expected: HashSet<Uuid> = expected_members.iter().copied().collect();
        if current != expected || self.take_injected_failure() {
            return Err(StoreError::MembershipChanged);
        }

        let now = Utc::now();
        let assignments = pairs
            .iter()
            .map(|pair| Assignment {
                group_id,
                giver_membership_id: pair.giver,
                receiver_membership_id: pair.receiver,
                created_at: now,
            })
            .collect();
        state.assignments.insert(group_id, assignments);

        let group = state.groups.get_mut(&group_id).ok_or(StoreError::NotFound)?;
        group.status = GroupStatus::Drawn;
        group.drawn_at = Some(now);
        group.updated_at = now;
        Ok(group.clone())
    }

    async fn find_assignment_for_giver(
        &self,
        group_id: Uuid,
        giver_membership_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .get(&group_id)
            .and_then(|all| {
                all.iter()
                    .find(|a| a.giver_membership_id == giver_membership_id)
                    .cloned()
            }))
    }

    async fn list_assignments(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn sync_member_profile(
        &self,
        user_id: Uuid,
        profile: &MemberProfile,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.display_name = profile.display_name.clone();
            user.handle = profile.handle.clone();
            user.avatar = profile.avatar.clone();
            user.frame = profile.frame.clone();
        }

        let mut updated = 0;
        for membership in state.memberships.iter_mut().filter(|m| m.belongs_to(user_id)) {
            membership.profile = profile.clone();
            updated += 1;
        }
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl InviteStore for InMemoryStore {
    async fn find_active_invite(&self, group_id: Uuid) -> Result<Option<Invite>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .invites
            .values()
            .find(|i| i.group_id == group_id && i.is_active)
            .cloned())
    }

    async fn find_invite(&self, code: &str) -> Result<Option<Invite>, StoreError> {
        Ok(self.state.read().await.invites.get(code).cloned())
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let group_has_active = state
            .invites
            .values()
            .any(|i| i.group_id == invite.group_id && i.is_active);
        if state.invites.contains_key(&invite.code) || group_has_active {
            return Err(StoreError::Duplicate);
        }
        state.invites.insert(invite.code.clone(), invite.clone());
        Ok(())
    }

    async fn deactivate_invites(&self, group_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for invite in state
            .invites
            .values_mut()
            .filter(|i| i.group_id == group_id && i.is_active)
        {
            invite.is_active = false;
            count += 1;
        }
        Ok(count)
    }

    async fn record_invite_use(&self, code: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let invite = state.invites.get_mut(code).ok_or(StoreError::NotFound)?;
        invite.use_count += 1;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| {
                u.handle
                    .as_deref()
                    .is_some_and(|h| h.eq_ignore_ascii_case(handle))
            })
            .cloned())
    }
}

#[async_trait]
impl WishlistReader for InMemoryStore {
    async fn list_wishlist(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WishlistItem>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .wishlists
            .get(&user_id)
            .map(|items| items.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    async fn seeded() -> (InMemoryStore, Group, Vec<Uuid>) {
        let store = InMemoryStore::new();
        let owner = store.insert_user("Ana", Some("ana")).await;
        let (group, owner_membership) = store
            .create_group(
                NewGroup {
                    name: "Natal".to_string(),
                    description: None,
                    event_date: None,
                    max_price: Decimal::new(50, 0),
                    owner_id: owner,
                },
                MemberProfile::guest("Ana"),
            )
            .await
            .unwrap();
        let guest = store
            .insert_membership(NewMembership {
                group_id: group.id,
                user_id: None,
                guest_email: Some("tio@example.com".to_string()),
                is_admin: false,
                profile: MemberProfile::guest("Tio"),
            })
            .await
            .unwrap();
        (store, group, vec![owner_membership.id, guest.id])
    }

    #[tokio::test]
    async fn test_replace_assignments_checks_member_set() {
        let (store, group, ids) = seeded().await;
        let pairs = [
            AssignmentPair {
                giver: ids[0],
                receiver: ids[1],
            },
            AssignmentPair {
                giver: ids[1],
                receiver: ids[0],
            },
        ];

        let stale = [ids[0]];
        assert_eq!(
            store
                .replace_assignments(group.id, group.owner_id, &stale, &pairs)
                .await
                .unwrap_err(),
            StoreError::MembershipChanged
        );
        assert!(store.list_assignments(group.id).await.unwrap().is_empty());

        let drawn = store
            .replace_assignments(group.id, group.owner_id, &ids, &pairs)
            .await
            .unwrap();
        assert_eq!(drawn.status, GroupStatus::Drawn);
        assert_eq!(store.list_assignments(group.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let (store, group, ids) = seeded().await;
        let pairs = [
            AssignmentPair {
                giver: ids[0],
                receiver: ids[1],
            },
            AssignmentPair {
                giver: ids[1],
                receiver: ids[0],
            },
        ];
        store.fail_next_replacements(1);
        assert!(store
            .replace_assignments(group.id, group.owner_id, &ids, &pairs)
            .await
            .is_err());
        assert!(store
            .replace_assignments(group.id, group.owner_id, &ids, &pairs)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_writes_recheck_owner_under_lock() {
        let (store, group, ids) = seeded().await;
        let pairs = [
            AssignmentPair {
                giver: ids[0],
                receiver: ids[1],
            },
            AssignmentPair {
                giver: ids[1],
                receiver: ids[0],
            },
        ];
        let someone_else = Uuid::new_v4();

        assert_eq!(
            store
                .replace_assignments(group.id, someone_else, &ids, &pairs)
                .await
                .unwrap_err(),
            StoreError::OwnerChanged
        );
        assert!(store.list_assignments(group.id).await.unwrap().is_empty());

        assert_eq!(
            store
                .transfer_ownership(group.id, someone_else, ids[0], ids[1], someone_else)
                .await
                .unwrap_err(),
            StoreError::OwnerChanged
        );
        assert_eq!(
            store
                .delete_membership(group.id, ids[1], Some(someone_else))
                .await
                .unwrap_err(),
            StoreError::OwnerChanged
        );

        let unchanged = store.find_group(group.id).await.unwrap().unwrap();
        assert_eq!(unchanged.owner_id, group.owner_id);
        assert_eq!(store.list_memberships(group.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_owner_membership_is_never_deleted() {
        let (store, group, ids) = seeded().await;
        for acting in [None, Some(group.owner_id)] {
            assert_eq!(
                store
                    .delete_membership(group.id, ids[0], acting)
                    .await
                    .unwrap_err(),
                StoreError::OwnerMembership
            );
        }
        store
            .delete_membership(group.id, ids[1], Some(group.owner_id))
            .await
            .unwrap();
        assert_eq!(store.list_memberships(group.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_active_invite_per_group() {
        let (store, group, _) = seeded().await;
        let creator = Uuid::new_v4();
        let first = Invite::new(group.id, creator, None);
        store.insert_invite(&first).await.unwrap();

        let second = Invite::new(group.id, creator, None);
        assert_eq!(
            store.insert_invite(&second).await.unwrap_err(),
            StoreError::Duplicate
        );

        assert_eq!(store.deactivate_invites(group.id).await.unwrap(), 1);
        store.insert_invite(&second).await.unwrap();
        assert_eq!(
            store.find_active_invite(group.id).await.unwrap().unwrap().code,
            second.code
        );
    }

    #[tokio::test]
    async fn test_handle_lookup_is_case_insensitive() {
        let store = InMemoryStore::new();
        let id = store.insert_user("Bia", Some("Bia_99")).await;
        let found = store.find_user_by_handle("bia_99").await.unwrap().unwrap();
        assert_eq!(found.id, id);
    }
}
