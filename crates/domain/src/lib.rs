//! Domain layer for the Secret Santa backend.
//!
//! This crate contains:
//! - Domain models (Group, Membership, Assignment, Invite)
//! - Storage ports and an in-memory implementation of them
//! - The draw engine and the group, membership and invitation services
//! - Domain error types

pub mod errors;
pub mod memory;
pub mod models;
pub mod services;
pub mod store;
