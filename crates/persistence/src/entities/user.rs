//! Profile and wishlist entities (read-only views of external data).

use domain::models::{UserProfile, WishlistItem};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub frame: Option<String>,
}

impl From<UserEntity> for UserProfile {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            display_name: entity.display_name,
            handle: entity.handle,
            avatar: entity.avatar,
            frame: entity.frame,
        }
    }
}

/// Database row mapping for the wishlist_items table.
#[derive(Debug, Clone, FromRow)]
pub struct WishlistItemEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
}

impl From<WishlistItemEntity> for WishlistItem {
    fn from(entity: WishlistItemEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            price: entity.price,
            link: entity.link,
        }
    }
}
