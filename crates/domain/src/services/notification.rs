//! Notification sink for group events.
//!
//! Delivery is best-effort: a failing sink is logged and never fails the
//! operation that produced the event.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Category shown in the user's notification feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Invite,
    Info,
    Success,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Invite => "invite",
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Something that happened to a group that a user should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GroupEvent {
    InviteSent {
        group_id: Uuid,
        group_name: String,
        invite_code: String,
        invited_by: String,
    },
    RemovedFromGroup {
        group_id: Uuid,
        group_name: String,
    },
    OwnershipTransferred {
        group_id: Uuid,
        group_name: String,
    },
    GroupDeleted {
        group_id: Uuid,
        group_name: String,
    },
    DrawPerformed {
        group_id: Uuid,
        group_name: String,
    },
}

impl GroupEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            GroupEvent::InviteSent { .. } => NotificationKind::Invite,
            GroupEvent::RemovedFromGroup { .. } | GroupEvent::GroupDeleted { .. } => {
                NotificationKind::Warning
            }
            GroupEvent::OwnershipTransferred { .. } => NotificationKind::Info,
            GroupEvent::DrawPerformed { .. } => NotificationKind::Success,
        }
    }

    pub fn group_id(&self) -> Uuid {
        match self {
            GroupEvent::InviteSent { group_id, .. }
            | GroupEvent::RemovedFromGroup { group_id, .. }
            | GroupEvent::OwnershipTransferred { group_id, .. }
            | GroupEvent::GroupDeleted { group_id, .. }
            | GroupEvent::DrawPerformed { group_id, .. } => *group_id,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            GroupEvent::InviteSent { .. } => "Group invitation",
            GroupEvent::RemovedFromGroup { .. } => "Removed from group",
            GroupEvent::OwnershipTransferred { .. } => "You are now the group owner",
            GroupEvent::GroupDeleted { .. } => "Group deleted",
            GroupEvent::DrawPerformed { .. } => "The draw is done",
        }
    }

    pub fn message(&self) -> String {
        match self {
            GroupEvent::InviteSent {
                group_name,
                invited_by,
                ..
            } => format!("{} invited you to join \"{}\"", invited_by, group_name),
            GroupEvent::RemovedFromGroup { group_name, .. } => {
                format!("You were removed from \"{}\"", group_name)
            }
            GroupEvent::OwnershipTransferred { group_name, .. } => {
                format!("You are now the owner of \"{}\"", group_name)
            }
            GroupEvent::GroupDeleted { group_name, .. } => {
                format!("\"{}\" was deleted by its owner", group_name)
            }
            GroupEvent::DrawPerformed { group_name, .. } => {
                format!("Names were drawn in \"{}\". Find out who you got!", group_name)
            }
        }
    }

    /// Structured payload stored alongside the notification.
    pub fn data(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Destination for group events.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, user_id: Uuid, event: &GroupEvent) -> Result<(), NotificationError>;
}

/// Delivers an event, logging instead of returning any failure.
pub async fn notify_best_effort(sink: &dyn NotificationSink, user_id: Uuid, event: GroupEvent) {
    if let Err(e) = sink.deliver(user_id, &event).await {
        tracing::warn!(
            user_id = %user_id,
            group_id = %event.group_id(),
            kind = %event.kind(),
            error = %e,
            "Failed to deliver group notification"
        );
    }
}

/// Sink that keeps delivered events in memory.
///
/// Used in tests and local runs without a database.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    delivered: Mutex<Vec<(Uuid, GroupEvent)>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that rejects every delivery.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn delivered(&self) -> Vec<(Uuid, GroupEvent)> {
        self.delivered
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn delivered_to(&self, user_id: Uuid) -> Vec<GroupEvent> {
        self.delivered()
            .into_iter()
            .filter(|(to, _)| *to == user_id)
            .map(|(_, event)| event)
            .collect()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn deliver(&self, user_id: Uuid, event: &GroupEvent) -> Result<(), NotificationError> {
        if self.simulate_failure {
            tracing::warn!(
                user_id = %user_id,
                kind = %event.kind(),
                "Recording sink simulating failure"
            );
            return Err(NotificationError("Simulated failure".to_string()));
        }

        tracing::debug!(
            user_id = %user_id,
            kind = %event.kind(),
            title = event.title(),
            "Recorded group notification"
        );
        self.delivered
            .lock()
            .map_err(|_| NotificationError("recording sink poisoned".to_string()))?
            .push((user_id, event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted() -> GroupEvent {
        GroupEvent::GroupDeleted {
            group_id: Uuid::nil(),
            group_name: "Natal".to_string(),
        }
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(deleted().kind(), NotificationKind::Warning);
        assert_eq!(
            GroupEvent::DrawPerformed {
                group_id: Uuid::nil(),
                group_name: "x".into()
            }
            .kind()
            .to_string(),
            "success"
        );
    }

    #[test]
    fn test_event_data_is_tagged() {
        let data = deleted().data();
        assert_eq!(data["event"], "group_deleted");
        assert_eq!(data["group_name"], "Natal");
        assert!(deleted().message().contains("Natal"));
    }

    #[tokio::test]
    async fn test_recording_sink_records() {
        let sink = RecordingNotificationSink::new();
        let user = Uuid::new_v4();
        notify_best_effort(&sink, user, deleted()).await;

        assert_eq!(sink.delivered_to(user), vec![deleted()]);
        assert!(sink.delivered_to(Uuid::new_v4()).is_empty());
    }

    #[tokio::test]
    async fn test_failing_sink_is_absorbed() {
        let sink = RecordingNotificationSink::failing();
        assert!(sink.deliver(Uuid::nil(), &deleted()).await.is_err());

        // Must not panic or propagate.
        notify_best_effort(&sink, Uuid::nil(), deleted()).await;
        assert!(sink.delivered().is_empty());
    }
}
