//! Shared utilities for the Secret Santa backend.
//!
//! - JWT verification for tokens issued by the identity provider
//! - Handle and invite code normalisation/validation

pub mod jwt;
pub mod validation;
