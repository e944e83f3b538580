//! Bridges Postgres profile notifications onto the in-process channel.
//!
//! The users table publishes on `user_profile_changed` whenever a display
//! field changes. Each payload is decoded into a [`ProfileChanged`] and
//! forwarded to the profile sync subscriber.

use domain::models::ProfileChanged;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Channel name used by the users table trigger.
pub const PROFILE_CHANGED_CHANNEL: &str = "user_profile_changed";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Decodes one notification payload.
pub fn parse_profile_changed(payload: &str) -> Result<ProfileChanged, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Spawns the listener task. It reconnects after connection failures and
/// stops once every receiver of `events` is gone.
pub fn spawn_profile_listener(
    pool: PgPool,
    events: broadcast::Sender<ProfileChanged>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listen(&pool, &events).await {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, "Profile listener failed, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
        info!("Profile listener stopped");
    })
}

async fn listen(
    pool: &PgPool,
    events: &broadcast::Sender<ProfileChanged>,
) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(PROFILE_CHANGED_CHANNEL).await?;
    info!(channel = PROFILE_CHANGED_CHANNEL, "Listening for profile changes");

    loop {
        let notification = listener.recv().await?;
        match parse_profile_changed(notification.payload()) {
            Ok(event) => {
                if events.send(event).is_err() {
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed profile notification");
            }
        }
    }
}
