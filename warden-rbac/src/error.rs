//! Validation errors for roles and permissions
//!
//! These are raised before anything reaches storage.

use thiserror::Error;

/// Validation error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RbacError {
    /// Role name is empty or whitespace
    #[error("Invalid role name: {0:?}")]
    InvalidRoleName(String),

    /// Permission definition is unusable (blank resource, no actions)
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),
}

/// Result type for model validation.
pub type RbacResult<T> = Result<T, RbacError>;
