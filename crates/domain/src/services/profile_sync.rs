//! Keeps cached member display fields in step with user profiles.
//!
//! The profile store publishes [`ProfileChanged`] events on a broadcast
//! channel; the subscriber rewrites every membership of that user.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::models::ProfileChanged;
use crate::store::GroupStore;

pub const PROFILE_CHANNEL_CAPACITY: usize = 256;

/// Creates the channel profile events are published on.
pub fn profile_channel() -> (
    broadcast::Sender<ProfileChanged>,
    broadcast::Receiver<ProfileChanged>,
) {
    broadcast::channel(PROFILE_CHANNEL_CAPACITY)
}

#[derive(Clone)]
pub struct ProfileSync {
    groups: Arc<dyn GroupStore>,
}

impl ProfileSync {
    pub fn new(groups: Arc<dyn GroupStore>) -> Self {
        Self { groups }
    }

    /// Applies one event. Returns how many memberships were rewritten.
    pub async fn apply(&self, event: &ProfileChanged) -> Result<u64, StoreError> {
        let updated = self
            .groups
            .sync_member_profile(event.user_id, &event.member_profile())
            .await?;
        debug!(user_id = %event.user_id, updated, "Member profiles synced");
        Ok(updated)
    }

    /// Consumes events until the channel closes.
    pub fn spawn(self, mut events: broadcast::Receiver<ProfileChanged>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Profile sync subscriber started");
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.apply(&event).await {
                            warn!(user_id = %event.user_id, error = %e, "Profile sync failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Profile sync lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("Profile sync subscriber stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{fixture, Fixture};

    #[tokio::test]
    async fn test_profile_change_fans_out_to_all_memberships() {
        let Fixture {
            store,
            groups,
            owner,
            group,
            ..
        } = fixture(&["Bruno"]).await;
        let second = groups
            .create_group(
                owner,
                crate::models::CreateGroupRequest {
                    name: "Escritório".to_string(),
                    description: None,
                    event_date: None,
                    max_price: rust_decimal::Decimal::new(50, 0),
                },
            )
            .await
            .unwrap();

        let (tx, rx) = profile_channel();
        let handle = ProfileSync::new(store.clone()).spawn(rx);

        tx.send(ProfileChanged {
            user_id: owner,
            display_name: "Ana Maria".to_string(),
            handle: Some("anamaria".to_string()),
            avatar: Some("https://cdn.example.com/a.png".to_string()),
            frame: Some("snow".to_string()),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        for group_id in [group.id, second.group.id] {
            let mine = store
                .find_membership_for_user(group_id, owner)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(mine.profile.display_name, "Ana Maria");
            assert_eq!(mine.profile.frame.as_deref(), Some("snow"));
        }
    }

    #[tokio::test]
    async fn test_apply_for_user_without_memberships() {
        let Fixture { store, .. } = fixture(&[]).await;
        let sync = ProfileSync::new(store);
        let updated = sync
            .apply(&ProfileChanged {
                user_id: uuid::Uuid::new_v4(),
                display_name: "Ninguém".to_string(),
                handle: None,
                avatar: None,
                frame: None,
            })
            .await
            .unwrap();
        assert_eq!(updated, 0);
    }
}
