//! # Error Types
//!
//! Errors shared across crates.

use thiserror::Error;

use crate::entities::Role;

/// Access control failures raised before any engine work happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Caller's role is not allowed to perform the operation.
    #[error("Forbidden: role {role} not in {allowed:?}")]
    Forbidden { role: Role, allowed: Vec<Role> },

    /// Role string from the identity layer is not recognised.
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}
