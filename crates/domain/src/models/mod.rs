//! Domain models for the gift exchange.

pub mod assignment;
pub mod group;
pub mod invite;
pub mod membership;
pub mod user;

pub use assignment::{Assignment, AssignmentPair, DrawSummary, MatchWishlist, MyAssignment};
pub use group::{
    CreateGroupRequest, Group, GroupChanges, GroupDetail, GroupStatus, GroupSummary, NewGroup,
    UpdateGroupRequest,
};
pub use invite::{AcceptedInvite, Invite, InviteInfo};
pub use membership::{
    AddMemberRequest, DirectInviteRequest, MemberProfile, MemberRef, Membership, NewMembership,
    TransferOwnershipRequest,
};
pub use user::{ProfileChanged, UserProfile, WishlistItem};
