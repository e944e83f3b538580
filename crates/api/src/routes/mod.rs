//! HTTP route handlers.

pub mod draw;
pub mod groups;
pub mod health;
pub mod invites;
pub mod members;
