//! Persistence layer for the Secret Santa backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain storage ports
//! - The profile change listener

pub mod db;
pub mod entities;
pub mod listener;
pub mod metrics;
pub mod repositories;
