//! Views of data owned by the external profile and wishlist stores.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::membership::MemberProfile;

/// Read-only profile projection of a registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub frame: Option<String>,
}

impl UserProfile {
    pub fn member_profile(&self) -> MemberProfile {
        MemberProfile {
            display_name: self.display_name.clone(),
            handle: self.handle.clone(),
            avatar: self.avatar.clone(),
            frame: self.frame.clone(),
        }
    }
}

/// Published by the profile store when display fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileChanged {
    pub user_id: Uuid,
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub frame: Option<String>,
}

impl ProfileChanged {
    pub fn member_profile(&self) -> MemberProfile {
        MemberProfile {
            display_name: self.display_name.clone(),
            handle: self.handle.clone(),
            avatar: self.avatar.clone(),
            frame: self.frame.clone(),
        }
    }
}

impl From<&UserProfile> for ProfileChanged {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id,
            display_name: profile.display_name.clone(),
            handle: profile.handle.clone(),
            avatar: profile.avatar.clone(),
            frame: profile.frame.clone(),
        }
    }
}

/// Wishlist entry as stored by the wishlist service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WishlistItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
}
