//! Error types for authorization operations
//!
//! Storage failures are reported by [`StoreError`]; everything the facade
//! can return is an [`AuthzError`].

use thiserror::Error;
use warden_rbac::{RbacError, RoleId};

use crate::config::ConfigError;

/// Persistence adapter error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing tables do not exist (not migrated yet)
    #[error("Schema missing: {0}")]
    SchemaMissing(String),

    /// A referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write would break a referential or uniqueness constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for persistence adapter calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Authorization error types.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Input rejected before reaching storage
    #[error(transparent)]
    Validation(#[from] RbacError),

    /// Storage call failed
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A role id used in a write does not exist
    #[error("Role not found: {0}")]
    RoleNotFound(RoleId),
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

impl AuthzError {
    /// Check if this error should be logged at error level.
    ///
    /// Validation failures and missing roles are caller mistakes.
    pub fn is_server_error(&self) -> bool {
        match self {
            AuthzError::Storage(StoreError::NotFound(_) | StoreError::Conflict(_)) => false,
            AuthzError::Storage(_) | AuthzError::Config(_) => true,
            AuthzError::Validation(_) | AuthzError::RoleNotFound(_) => false,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthzError::Validation(RbacError::InvalidRoleName(_)) => "INVALID_ROLE_NAME",
            AuthzError::Validation(RbacError::InvalidPermission(_)) => "INVALID_PERMISSION",
            AuthzError::Storage(StoreError::SchemaMissing(_)) => "SCHEMA_MISSING",
            AuthzError::Storage(StoreError::NotFound(_)) => "NOT_FOUND",
            AuthzError::Storage(StoreError::Conflict(_)) => "CONFLICT",
            AuthzError::Storage(StoreError::Backend(_)) => "STORAGE_ERROR",
            AuthzError::Config(_) => "CONFIG_ERROR",
            AuthzError::RoleNotFound(_) => "ROLE_NOT_FOUND",
        }
    }
}
