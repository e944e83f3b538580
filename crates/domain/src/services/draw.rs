//! Draw engine: random derangement over a group's members.
//!
//! The derangement is produced by rejection sampling uniform shuffles, which
//! gives a uniform distribution over derangements. The number of shuffles is
//! capped; when the cap is hit the last shuffle is turned into a single cycle
//! (each member gives to the next one in shuffled order), which is always a
//! valid derangement for two or more members.

use metrics::{counter, histogram};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{GroupError, GroupResult, StoreError};
use crate::models::{AssignmentPair, DrawSummary, MatchWishlist, MyAssignment};
use crate::services::notification::{notify_best_effort, GroupEvent, NotificationSink};
use crate::services::{load_group, require_owner};
use crate::store::{GroupStore, WishlistReader};

pub const DEFAULT_MAX_SHUFFLE_ATTEMPTS: u32 = 64;
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
pub const DEFAULT_WISHLIST_LIMIT: usize = 3;

/// A permutation of indices `0..n` with no fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derangement {
    /// `receivers[i]` is the index that position `i` gives to.
    pub receivers: Vec<usize>,
    /// Shuffles performed, including the accepted one.
    pub attempts: u32,
    /// True when the rotation fallback produced the result.
    pub used_fallback: bool,
}

impl Derangement {
    /// Maps the index permutation onto concrete ids.
    pub fn pairs(&self, ids: &[Uuid]) -> Vec<AssignmentPair> {
        self.receivers
            .iter()
            .enumerate()
            .map(|(giver, &receiver)| AssignmentPair {
                giver: ids[giver],
                receiver: ids[receiver],
            })
            .collect()
    }
}

/// Draws a uniformly random derangement of `n` positions.
///
/// Fails with `InsufficientParticipants` when `n < 2`.
pub fn derange<R: Rng + ?Sized>(
    n: usize,
    max_attempts: u32,
    rng: &mut R,
) -> GroupResult<Derangement> {
    if n < 2 {
        return Err(GroupError::InsufficientParticipants { found: n });
    }

    let max_attempts = max_attempts.max(1);
    let mut shuffled: Vec<usize> = (0..n).collect();

    for attempt in 1..=max_attempts {
        shuffled.shuffle(rng);
        if shuffled.iter().enumerate().all(|(i, &r)| i != r) {
            return Ok(Derangement {
                receivers: shuffled,
                attempts: attempt,
                used_fallback: false,
            });
        }
    }

    Ok(Derangement {
        receivers: rotate_into_cycle(&shuffled),
        attempts: max_attempts,
        used_fallback: true,
    })
}

/// Treats `order` as a ring: `order[k]` gives to `order[k + 1]`.
fn rotate_into_cycle(order: &[usize]) -> Vec<usize> {
    let n = order.len();
    let mut receivers = vec![0; n];
    for k in 0..n {
        receivers[order[k]] = order[(k + 1) % n];
    }
    receivers
}

/// Returns true if `receivers` is a bijection on `0..n` without fixed points.
pub fn is_derangement(receivers: &[usize]) -> bool {
    let mut seen = vec![false; receivers.len()];
    for (giver, &receiver) in receivers.iter().enumerate() {
        if giver == receiver || receiver >= receivers.len() || seen[receiver] {
            return false;
        }
        seen[receiver] = true;
    }
    true
}

/// Tunables for the draw engine.
#[derive(Debug, Clone)]
pub struct DrawConfig {
    pub max_shuffle_attempts: u32,
    /// How many times a draw is recomputed when membership changes mid-draw.
    pub max_conflict_retries: u32,
    /// Items shown from the receiver's wishlist.
    pub wishlist_limit: usize,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            max_shuffle_attempts: DEFAULT_MAX_SHUFFLE_ATTEMPTS,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            wishlist_limit: DEFAULT_WISHLIST_LIMIT,
        }
    }
}

/// Performs draws and answers "who did I get" queries.
///
/// The only writer of assignments.
pub struct DrawEngine {
    groups: Arc<dyn GroupStore>,
    wishlists: Arc<dyn WishlistReader>,
    notifier: Arc<dyn NotificationSink>,
    config: DrawConfig,
}

impl DrawEngine {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        wishlists: Arc<dyn WishlistReader>,
        notifier: Arc<dyn NotificationSink>,
        config: DrawConfig,
    ) -> Self {
        Self {
            groups,
            wishlists,
            notifier,
            config,
        }
    }

    /// Computes and persists a new assignment set. Owner only.
    ///
    /// Re-drawing a drawn group replaces the previous set entirely.
    pub async fn perform_draw(&self, group_id: Uuid, caller_id: Uuid) -> GroupResult<DrawSummary> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        require_owner(&group, caller_id, "perform the draw")?;

        let mut conflicts = 0;
        loop {
            let members = self.groups.list_memberships(group_id).await?;
            let ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();

            let derangement = {
                let mut rng = rand::thread_rng();
                derange(ids.len(), self.config.max_shuffle_attempts, &mut rng)?
            };
            histogram!("draw_shuffle_attempts").record(derangement.attempts as f64);
            if derangement.used_fallback {
                warn!(
                    group_id = %group_id,
                    attempts = derangement.attempts,
                    "Shuffle limit reached, using rotation fallback"
                );
            }

            let pairs = derangement.pairs(&ids);
            match self
                .groups
                .replace_assignments(group_id, caller_id, &ids, &pairs)
                .await
            {
                Ok(updated) => {
                    counter!("draws_performed_total").increment(1);
                    info!(
                        group_id = %group_id,
                        user_id = %caller_id,
                        participants = ids.len(),
                        "Draw performed"
                    );

                    for member in &members {
                        if let Some(user_id) = member.user_id.filter(|id| *id != caller_id) {
                            notify_best_effort(
                                self.notifier.as_ref(),
                                user_id,
                                GroupEvent::DrawPerformed {
                                    group_id,
                                    group_name: updated.name.clone(),
                                },
                            )
                            .await;
                        }
                    }

                    return Ok(DrawSummary {
                        group_id,
                        status: updated.status,
                        participant_count: ids.len(),
                        drawn_at: updated.drawn_at,
                    });
                }
                Err(StoreError::MembershipChanged) if conflicts < self.config.max_conflict_retries => {
                    conflicts += 1;
                    warn!(
                        group_id = %group_id,
                        retry = conflicts,
                        "Membership changed during draw, recomputing"
                    );
                }
                Err(StoreError::NotFound) => return Err(GroupError::NotFound("Group".to_string())),
                Err(StoreError::OwnerChanged) => {
                    return Err(GroupError::owner_only("perform the draw"))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The receiver the caller gives to, if a draw exists.
    ///
    /// Only the row whose giver is the caller's own membership is read.
    pub async fn get_my_assignment(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
    ) -> GroupResult<MyAssignment> {
        let group = load_group(self.groups.as_ref(), group_id).await?;
        let mut mine = MyAssignment {
            group_id,
            status: group.status,
            receiver: None,
        };

        if !group.status.is_drawn() {
            return Ok(mine);
        }
        let Some(membership) = self
            .groups
            .find_membership_for_user(group_id, caller_id)
            .await?
        else {
            return Ok(mine);
        };

        if let Some(assignment) = self
            .groups
            .find_assignment_for_giver(group_id, membership.id)
            .await?
        {
            mine.receiver = self
                .groups
                .find_membership(assignment.receiver_membership_id)
                .await?
                .filter(|receiver| receiver.group_id == group_id);
        }

        Ok(mine)
    }

    /// Wishlist of the caller's receiver, capped at the configured size.
    pub async fn my_match_wishlist(
        &self,
        group_id: Uuid,
        caller_id: Uuid,
    ) -> GroupResult<MatchWishlist> {
        let receiver = self
            .get_my_assignment(group_id, caller_id)
            .await?
            .receiver
            .ok_or_else(|| GroupError::NotFound("Assignment".to_string()))?;

        let items = match receiver.user_id {
            Some(user_id) => {
                self.wishlists
                    .list_wishlist(user_id, self.config.wishlist_limit)
                    .await?
            }
            None => Vec::new(),
        };

        Ok(MatchWishlist { receiver, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::{Membership, MemberRef};
    use crate::services::notification::RecordingNotificationSink;
    use crate::services::testing::{fixture, Fixture, TransferBeforeWrite};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_derangement_property_up_to_200() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 2..=200 {
            let d = derange(n, DEFAULT_MAX_SHUFFLE_ATTEMPTS, &mut rng).unwrap();
            assert_eq!(d.receivers.len(), n);
            assert!(is_derangement(&d.receivers), "n = {} not a derangement", n);
        }
    }

    #[test]
    fn test_two_members_always_swap() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let d = derange(2, DEFAULT_MAX_SHUFFLE_ATTEMPTS, &mut rng).unwrap();
            assert_eq!(d.receivers, vec![1, 0]);
        }
    }

    #[test]
    fn test_fewer_than_two_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            derange(0, 10, &mut rng),
            Err(GroupError::InsufficientParticipants { found: 0 })
        );
        assert_eq!(
            derange(1, 10, &mut rng),
            Err(GroupError::InsufficientParticipants { found: 1 })
        );
    }

    #[test]
    fn test_three_members_uniform_over_1000_runs() {
        // Ana = 0, Bruno = 1, Carlos = 2
        let mut rng = StdRng::seed_from_u64(2024);
        let mut ana_gives_bruno = 0;
        for _ in 0..1000 {
            let d = derange(3, DEFAULT_MAX_SHUFFLE_ATTEMPTS, &mut rng).unwrap();
            assert!(is_derangement(&d.receivers));
            if d.receivers[0] == 1 {
                ana_gives_bruno += 1;
            }
        }
        assert!(
            (400..=600).contains(&ana_gives_bruno),
            "Ana -> Bruno in {} of 1000 runs",
            ana_gives_bruno
        );
    }

    #[test]
    fn test_fallback_still_valid() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut fallbacks = 0;
        for run in 0..100 {
            let n = 2 + run % 10;
            let d = derange(n, 1, &mut rng).unwrap();
            assert!(is_derangement(&d.receivers));
            if d.used_fallback {
                fallbacks += 1;
            }
        }
        assert!(fallbacks > 0);
    }

    #[test]
    fn test_rotate_into_cycle_is_single_cycle() {
        let receivers = rotate_into_cycle(&[3, 0, 4, 1, 2]);
        assert!(is_derangement(&receivers));
        let mut seen = HashSet::new();
        let mut at = 0;
        for _ in 0..5 {
            assert!(seen.insert(at));
            at = receivers[at];
        }
        assert_eq!(at, 0);
    }

    #[test]
    fn test_is_derangement_rejects_invalid() {
        assert!(!is_derangement(&[0, 1]));
        assert!(!is_derangement(&[1, 1, 0]));
        assert!(!is_derangement(&[1, 5]));
        assert!(is_derangement(&[1, 2, 0]));
    }

    async fn assert_valid_draw(store: &InMemoryStore, group_id: Uuid) {
        let members: Vec<Membership> = store.list_memberships(group_id).await.unwrap();
        let assignments = store.list_assignments(group_id).await.unwrap();
        assert_eq!(assignments.len(), members.len());

        let givers: HashSet<Uuid> = assignments.iter().map(|a| a.giver_membership_id).collect();
        let receivers: HashSet<Uuid> =
            assignments.iter().map(|a| a.receiver_membership_id).collect();
        let ids: HashSet<Uuid> = members.iter().map(|m| m.id).collect();
        assert_eq!(givers, ids);
        assert_eq!(receivers, ids);
        assert!(assignments
            .iter()
            .all(|a| a.giver_membership_id != a.receiver_membership_id));
    }

    #[tokio::test]
    async fn test_perform_draw_persists_derangement() {
        let Fixture {
            store,
            draw,
            owner,
            group,
            ..
        } = fixture(&["Bruno", "Carlos", "Dani"]).await;

        let summary = draw.perform_draw(group.id, owner).await.unwrap();
        assert_eq!(summary.participant_count, 4);
        assert!(summary.status.is_drawn());
        assert!(summary.drawn_at.is_some());
        assert_valid_draw(&store, group.id).await;
    }

    #[tokio::test]
    async fn test_redraw_replaces_assignment_set() {
        let Fixture {
            store,
            draw,
            owner,
            group,
            ..
        } = fixture(&["Bruno", "Carlos"]).await;

        draw.perform_draw(group.id, owner).await.unwrap();
        draw.perform_draw(group.id, owner).await.unwrap();

        assert_eq!(store.list_assignments(group.id).await.unwrap().len(), 3);
        assert_valid_draw(&store, group.id).await;
    }

    #[tokio::test]
    async fn test_non_owner_cannot_draw_and_nothing_changes() {
        let Fixture {
            store,
            draw,
            group,
            users,
            ..
        } = fixture(&["Bruno", "Carlos"]).await;

        let err = draw.perform_draw(group.id, users[0]).await.unwrap_err();
        assert!(matches!(err, GroupError::Unauthorized(_)));

        let after = store.find_group(group.id).await.unwrap().unwrap();
        assert!(!after.status.is_drawn());
        assert!(store.list_assignments(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draw_needs_two_members() {
        let Fixture {
            draw, owner, group, ..
        } = fixture(&[]).await;

        assert_eq!(
            draw.perform_draw(group.id, owner).await.unwrap_err(),
            GroupError::InsufficientParticipants { found: 1 }
        );
    }

    #[tokio::test]
    async fn test_draw_unknown_group() {
        let Fixture { draw, owner, .. } = fixture(&[]).await;
        assert!(matches!(
            draw.perform_draw(Uuid::new_v4(), owner).await,
            Err(GroupError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_two_member_draw_is_mutual() {
        let Fixture {
            draw,
            owner,
            group,
            users,
            ..
        } = fixture(&["Bruno"]).await;

        draw.perform_draw(group.id, owner).await.unwrap();
        let ana = draw.get_my_assignment(group.id, owner).await.unwrap();
        let bruno = draw.get_my_assignment(group.id, users[0]).await.unwrap();

        assert_eq!(ana.receiver.unwrap().user_id, Some(users[0]));
        assert_eq!(bruno.receiver.unwrap().user_id, Some(owner));
    }

    #[tokio::test]
    async fn test_my_assignment_is_private_and_consistent() {
        let Fixture {
            store,
            draw,
            owner,
            group,
            users,
            ..
        } = fixture(&["Bruno", "Carlos", "Dani", "Eva"]).await;

        draw.perform_draw(group.id, owner).await.unwrap();
        let assignments = store.list_assignments(group.id).await.unwrap();

        for user_id in std::iter::once(owner).chain(users.iter().copied()) {
            let membership = store
                .find_membership_for_user(group.id, user_id)
                .await
                .unwrap()
                .unwrap();
            let mine = draw.get_my_assignment(group.id, user_id).await.unwrap();
            let receiver = mine.receiver.unwrap();

            let expected = assignments
                .iter()
                .find(|a| a.giver_membership_id == membership.id)
                .unwrap();
            assert_eq!(receiver.id, expected.receiver_membership_id);
            assert_ne!(receiver.id, membership.id);
        }
    }

    #[tokio::test]
    async fn test_my_assignment_before_draw_and_for_outsiders() {
        let Fixture {
            draw,
            owner,
            group,
            ..
        } = fixture(&["Bruno"]).await;

        let before = draw.get_my_assignment(group.id, owner).await.unwrap();
        assert!(before.receiver.is_none());

        draw.perform_draw(group.id, owner).await.unwrap();
        let outsider = draw
            .get_my_assignment(group.id, Uuid::new_v4())
            .await
            .unwrap();
        assert!(outsider.receiver.is_none());
        assert!(outsider.status.is_drawn());
    }

    #[tokio::test]
    async fn test_draw_notifies_other_members_even_if_sink_fails() {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingNotificationSink::failing());
        let f = crate::services::testing::fixture_with(store, sink, &["Bruno"]).await;

        assert!(f.draw.perform_draw(f.group.id, f.owner).await.is_ok());
    }

    #[tokio::test]
    async fn test_draw_sends_draw_performed() {
        let Fixture {
            draw,
            owner,
            group,
            users,
            sink,
            ..
        } = fixture(&["Bruno", "Carlos"]).await;

        draw.perform_draw(group.id, owner).await.unwrap();
        assert!(sink.delivered_to(owner).is_empty());
        for user in users {
            assert!(matches!(
                sink.delivered_to(user).as_slice(),
                [GroupEvent::DrawPerformed { .. }]
            ));
        }
    }

    #[tokio::test]
    async fn test_guest_participates_in_draw() {
        let Fixture {
            store,
            draw,
            members,
            owner,
            group,
            ..
        } = fixture(&["Bruno"]).await;

        members
            .add_member(
                group.id,
                owner,
                MemberRef::Guest {
                    name: "Vovó".to_string(),
                    email: None,
                },
            )
            .await
            .unwrap();

        draw.perform_draw(group.id, owner).await.unwrap();
        assert_eq!(store.list_assignments(group.id).await.unwrap().len(), 3);
        assert_valid_draw(&store, group.id).await;
    }

    #[tokio::test]
    async fn test_match_wishlist_read_through() {
        let Fixture {
            store,
            draw,
            owner,
            group,
            users,
            ..
        } = fixture(&["Bruno"]).await;

        let items: Vec<_> = (0..5)
            .map(|i| crate::models::WishlistItem {
                id: Uuid::new_v4(),
                name: format!("Livro {}", i),
                description: None,
                price: None,
                link: None,
            })
            .collect();
        store.set_wishlist(users[0], items).await;

        assert!(matches!(
            draw.my_match_wishlist(group.id, owner).await,
            Err(GroupError::NotFound(_))
        ));

        draw.perform_draw(group.id, owner).await.unwrap();
        let wishlist = draw.my_match_wishlist(group.id, owner).await.unwrap();
        assert_eq!(wishlist.receiver.user_id, Some(users[0]));
        assert_eq!(wishlist.items.len(), DEFAULT_WISHLIST_LIMIT);
        assert_eq!(wishlist.items[0].name, "Livro 0");
    }

    #[tokio::test]
    async fn test_membership_conflict_is_retried() {
        let Fixture {
            store,
            draw,
            owner,
            group,
            ..
        } = fixture(&["Bruno", "Carlos"]).await;

        store.fail_next_replacements(2);
        draw.perform_draw(group.id, owner).await.unwrap();
        assert_valid_draw(&store, group.id).await;
    }

    #[tokio::test]
    async fn test_persistent_conflict_is_reported_as_transient() {
        let Fixture {
            store,
            draw,
            owner,
            group,
            ..
        } = fixture(&["Bruno", "Carlos"]).await;

        store.fail_next_replacements(DEFAULT_MAX_CONFLICT_RETRIES + 1);
        assert!(matches!(
            draw.perform_draw(group.id, owner).await,
            Err(GroupError::TransientStorageFailure(_))
        ));
        let after = store.find_group(group.id).await.unwrap().unwrap();
        assert!(!after.status.is_drawn());
    }

    #[tokio::test]
    async fn test_draw_by_owner_who_lost_ownership_mid_draw_writes_nothing() {
        let Fixture {
            store,
            sink,
            owner,
            group,
            users,
            ..
        } = fixture(&["Bruno", "Carlos"]).await;
        let racing = Arc::new(TransferBeforeWrite::new(store.clone(), users[0]));
        let draw = DrawEngine::new(racing, store.clone(), sink.clone(), DrawConfig::default());

        assert!(matches!(
            draw.perform_draw(group.id, owner).await,
            Err(GroupError::Unauthorized(_))
        ));
        assert!(store.list_assignments(group.id).await.unwrap().is_empty());
        let after = store.find_group(group.id).await.unwrap().unwrap();
        assert_eq!(after.owner_id, users[0]);
        assert!(!after.status.is_drawn());
        assert!(sink.delivered_to(users[1]).is_empty());
    }
}
