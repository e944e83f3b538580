//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod assignment;
pub mod group;
pub mod invite;
pub mod membership;
pub mod user;

pub use assignment::AssignmentEntity;
pub use group::{GroupEntity, GroupStatusDb, GroupSummaryEntity};
pub use invite::InviteEntity;
pub use membership::MembershipEntity;
pub use user::{UserEntity, WishlistItemEntity};
