//! Group repository: groups, memberships and draw assignments.

use async_trait::async_trait;
use domain::errors::StoreError;
use domain::models::{
    Assignment, AssignmentPair, Group, GroupChanges, GroupSummary, MemberProfile, Membership,
    NewGroup, NewMembership,
};
use domain::store::GroupStore;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use crate::entities::{AssignmentEntity, GroupEntity, GroupSummaryEntity, MembershipEntity};
use crate::metrics::QueryTimer;
use crate::repositories::store_err;

/// Repository for group-related database operations.
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    /// Creates a new GroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Locks the group row until the transaction ends.
    ///
    /// Every write that changes the member set or the assignments takes this
    /// lock first, so draws and membership changes on one group serialize.
    /// Returns the owner as of the lock, for writes that act on the owner's
    /// behalf.
    async fn lock_group(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
    ) -> Result<Uuid, StoreError> {
        sqlx::query_scalar::<_, Uuid>("SELECT owner_id FROM groups WHERE id = $1 FOR UPDATE")
            .bind(group_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(store_err)?
            .ok_or(StoreError::NotFound)
    }

    /// Purges assignments and reverts a drawn group to created.
    async fn invalidate_draw(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM draw_assignments WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut **tx)
            .await
            .map_err(store_err)?;

        sqlx::query(
            r#"
            UPDATE groups
            SET status = 'created', drawn_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'drawn'
            "#,
        )
        .bind(group_id)
        .execute(&mut **tx)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl GroupStore for GroupRepository {
    async fn create_group(
        &self,
        group: NewGroup,
        owner_profile: MemberProfile,
    ) -> Result<(Group, Membership), StoreError> {
        let timer = QueryTimer::new("create_group");

        // Group and owner membership are created atomically
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let created = sqlx::query_as::<_, GroupEntity>(
            r#"
            INSERT INTO groups (name, description, event_date, max_price, owner_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, event_date, max_price, owner_id, status, drawn_at, created_at, updated_at
            "#,
        )
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.event_date)
        .bind(group.max_price)
        .bind(group.owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        let owner = sqlx::query_as::<_, MembershipEntity>(
            r#"
            INSERT INTO group_memberships (group_id, user_id, is_admin, display_name, handle, avatar, frame)
            VALUES ($1, $2, TRUE, $3, $4, $5, $6)
            RETURNING id, group_id, user_id, guest_email, is_admin, display_name, handle, avatar, frame, joined_at
            "#,
        )
        .bind(created.id)
        .bind(group.owner_id)
        .bind(&owner_profile.display_name)
        .bind(&owner_profile.handle)
        .bind(&owner_profile.avatar)
        .bind(&owner_profile.frame)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        timer.record();
        Ok((created.into(), owner.into()))
    }

    async fn find_group(&self, group_id: Uuid) -> Result<Option<Group>, StoreError> {
        let timer = QueryTimer::new("find_group_by_id");
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            SELECT id, name, description, event_date, max_price, owner_id, status, drawn_at, created_at, updated_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn update_group(
        &self,
        group_id: Uuid,
        changes: &GroupChanges,
    ) -> Result<Group, StoreError> {
        let timer = QueryTimer::new("update_group");
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            UPDATE groups
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                event_date = COALESCE($5, event_date),
                max_price = COALESCE($6, max_price),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, event_date, max_price, owner_id, status, drawn_at, created_at, updated_at
            "#,
        )
        .bind(group_id)
        .bind(&changes.name)
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.event_date)
        .bind(changes.max_price)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        result
            .map_err(store_err)?
            .map(Into::into)
            .ok_or(StoreError::NotFound)
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> Result<Vec<GroupSummary>, StoreError> {
        let timer = QueryTimer::new("list_groups_for_user");
        let result = sqlx::query_as::<_, GroupSummaryEntity>(
            r#"
            SELECT
                g.id, g.name, g.event_date, g.max_price, g.status,
                (SELECT COUNT(*) FROM group_memberships c WHERE c.group_id = g.id) AS member_count,
                (g.owner_id = $1) AS is_owner
            FROM groups g
            JOIN group_memberships gm ON gm.group_id = g.id AND gm.user_id = $1
            ORDER BY g.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result
            .map_err(store_err)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<(), StoreError> {
        let timer = QueryTimer::new("delete_group");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        Self::lock_group(&mut tx, group_id).await?;

        for statement in [
            "DELETE FROM draw_assignments WHERE group_id = $1",
            "DELETE FROM group_invites WHERE group_id = $1",
            "DELETE FROM group_memberships WHERE group_id = $1",
            "DELETE FROM groups WHERE id = $1",
        ] {
            sqlx::query(statement)
                .bind(group_id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        timer.record();
        Ok(())
    }

    async fn list_memberships(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let timer = QueryTimer::new("list_memberships");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            SELECT id, group_id, user_id, guest_email, is_admin, display_name, handle, avatar, frame, joined_at
            FROM group_memberships
            WHERE group_id = $1
            ORDER BY joined_at ASC, id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result
            .map_err(store_err)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn find_membership(
        &self,
        membership_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let timer = QueryTimer::new("find_membership_by_id");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            SELECT id, group_id, user_id, guest_email, is_admin, display_name, handle, avatar, frame, joined_at
            FROM group_memberships
            WHERE id = $1
            "#,
        )
        .bind(membership_id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn find_membership_for_user(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let timer = QueryTimer::new("find_membership_for_user");
        let result = sqlx::query_as::<_, MembershipEntity>(
            r#"
            SELECT id, group_id, user_id, guest_email, is_admin, display_name, handle, avatar, frame, joined_at
            FROM group_memberships
            WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn insert_membership(
        &self,
        membership: NewMembership,
    ) -> Result<Membership, StoreError> {
        let timer = QueryTimer::new("insert_membership");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        Self::lock_group(&mut tx, membership.group_id).await?;

        let created = sqlx::query_as::<_, MembershipEntity>(
            r#"
            INSERT INTO group_memberships (group_id, user_id, guest_email, is_admin, display_name, handle, avatar, frame)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, group_id, user_id, guest_email, is_admin, display_name, handle, avatar, frame, joined_at
            "#,
        )
        .bind(membership.group_id)
        .bind(membership.user_id)
        .bind(&membership.guest_email)
        .bind(membership.is_admin)
        .bind(&membership.profile.display_name)
        .bind(&membership.profile.handle)
        .bind(&membership.profile.avatar)
        .bind(&membership.profile.frame)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        Self::invalidate_draw(&mut tx, membership.group_id).await?;
        tx.commit().await.map_err(store_err)?;
        timer.record();
        Ok(created.into())
    }

    async fn delete_membership(
        &self,
        group_id: Uuid,
        membership_id: Uuid,
        acting_owner: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let timer = QueryTimer::new("delete_membership");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let owner_id = Self::lock_group(&mut tx, group_id).await?;
        if acting_owner.is_some_and(|acting| acting != owner_id) {
            return Err(StoreError::OwnerChanged);
        }

        let target_user = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT user_id FROM group_memberships WHERE id = $1 AND group_id = $2",
        )
        .bind(membership_id)
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?
        .ok_or(StoreError::NotFound)?;
        if target_user == Some(owner_id) {
            return Err(StoreError::OwnerMembership);
        }

        // Assignments go first; the cascade would otherwise leave a partial set.
        Self::invalidate_draw(&mut tx, group_id).await?;
        let deleted = sqlx::query("DELETE FROM group_memberships WHERE id = $1 AND group_id = $2")
            .bind(membership_id)
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await.map_err(store_err)?;
        timer.record();
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
        let timer = QueryTimer::new("transfer_ownership");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        if Self::lock_group(&mut tx, group_id).await? != expected_owner_id {
            return Err(StoreError::OwnerChanged);
        }

        // Admin flags first, owner_id last.
        let promoted = sqlx::query(
            r#"
            UPDATE group_memberships
            SET is_admin = (id = $3), updated_at = NOW()
            WHERE group_id = $1 AND id IN ($2, $3)
            "#,
        )
        .bind(group_id)
        .bind(from_membership_id)
        .bind(to_membership_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
        if promoted.rows_affected() != 2 {
            return Err(StoreError::NotFound);
        }

        let group = sqlx::query_as::<_, GroupEntity>(
            r#"
            UPDATE groups
            SET owner_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, event_date, max_price, owner_id, status, drawn_at, created_at, updated_at
            "#,
        )
        .bind(group_id)
        .bind(new_owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        timer.record();
        Ok(group.into())
    }

    async fn replace_assignments(
        &self,
        group_id: Uuid,
        expected_owner_id: Uuid,
        expected_members: &[Uuid],
        pairs: &[AssignmentPair],
    ) -> Result<Group, StoreError> {
        let timer = QueryTimer::new("replace_assignments");
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        if Self::lock_group(&mut tx, group_id).await? != expected_owner_id {
            return Err(StoreError::OwnerChanged);
        }

        let current: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM group_memberships WHERE group_id = $1",
        )
        .bind(group_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_err)?
        .into_iter()
        .collect();
        let expected: HashSet<Uuid> = expected_members.iter().copied().collect();
        if current != expected {
            return Err(StoreError::MembershipChanged);
        }

        sqlx::query("DELETE FROM draw_assignments WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        let givers: Vec<Uuid> = pairs.iter().map(|p| p.giver).collect();
        let receivers: Vec<Uuid> = pairs.iter().map(|p| p.receiver).collect();
        sqlx::query(
            r#"
            INSERT INTO draw_assignments (group_id, giver_membership_id, receiver_membership_id)
            SELECT $1, giver, receiver
            FROM UNNEST($2::uuid[], $3::uuid[]) AS pairs(giver, receiver)
            "#,
        )
        .bind(group_id)
        .bind(&givers)
        .bind(&receivers)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // Status flips last, inside the same transaction.
        let group = sqlx::query_as::<_, GroupEntity>(
            r#"
            UPDATE groups
            SET status = 'drawn', drawn_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, event_date, max_price, owner_id, status, drawn_at, created_at, updated_at
            "#,
        )
        .bind(group_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        timer.record();
        Ok(group.into())
    }

    async fn find_assignment_for_giver(
        &self,
        group_id: Uuid,
        giver_membership_id: Uuid,
    ) -> Result<Option<Assignment>, StoreError> {
        let timer = QueryTimer::new("find_assignment_for_giver");
        let result = sqlx::query_as::<_, AssignmentEntity>(
            r#"
            SELECT group_id, giver_membership_id, receiver_membership_id, created_at
            FROM draw_assignments
            WHERE group_id = $1 AND giver_membership_id = $2
            "#,
        )
        .bind(group_id)
        .bind(giver_membership_id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.map(Into::into))
    }

    async fn list_assignments(&self, group_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        let timer = QueryTimer::new("list_assignments");
        let result = sqlx::query_as::<_, AssignmentEntity>(
            r#"
            SELECT group_id, giver_membership_id, receiver_membership_id, created_at
            FROM draw_assignments
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result
            .map_err(store_err)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn sync_member_profile(
        &self,
        user_id: Uuid,
        profile: &MemberProfile,
    ) -> Result<u64, StoreError> {
        let timer = QueryTimer::new("sync_member_profile");
        let result = sqlx::query(
            r#"
            UPDATE group_memberships
            SET display_name = $2, handle = $3, avatar = $4, frame = $5, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(&profile.display_name)
        .bind(&profile.handle)
        .bind(&profile.avatar)
        .bind(&profile.frame)
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result.map_err(store_err)?.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_err)
    }
}
