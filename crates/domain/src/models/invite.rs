//! Invite code models.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use super::membership::Membership;

/// Alphabet for invite codes. Leaves out 0, O, I and 1.
const INVITE_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A shareable code that lets people join a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Invite {
    pub code: String,
    pub group_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// None means the code never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub use_count: i32,
    pub is_active: bool,
}

impl Invite {
    pub fn new(group_id: Uuid, created_by: Uuid, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            code: generate_invite_code(&mut rand::thread_rng()),
            group_id,
            created_by,
            created_at: Utc::now(),
            expires_at,
            use_count: 0,
            is_active: true,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Active and not past its expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

/// Public preview of an invite, shown before joining.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InviteInfo {
    pub code: String,
    pub group_id: Uuid,
    pub group_name: String,
    pub owner_name: String,
    pub owner_handle: Option<String>,
    pub member_count: usize,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of accepting an invite.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AcceptedInvite {
    pub group_id: Uuid,
    pub membership: Membership,
    /// True when the caller was already a member and nothing changed.
    pub already_member: bool,
}

/// Generate a random invite code in XXX-XXX-XXX format.
pub fn generate_invite_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut segment = || -> String {
        (0..3)
            .map(|_| INVITE_CODE_CHARSET[rng.gen_range(0..INVITE_CODE_CHARSET.len())] as char)
            .collect()
    };

    let first = segment();
    let second = segment();
    let third = segment();
    format!("{}-{}-{}", first, second, third)
}
