//! Role records
//!
//! A role groups permissions and is assigned to users. Role names are
//! case-insensitive: they are trimmed and lowercased before storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RbacError, RbacResult};
use crate::permissions::Permission;

/// Numeric role identifier assigned by storage.
pub type RoleId = i64;

/// A role together with its (possibly not yet loaded) permissions.
///
/// `permissions` is `None` until the role has been hydrated from storage.
/// `None` means "unknown", never "no permissions"; a role known to have no
/// permissions carries `Some(vec![])`.
///
/// `parent_id` is stored and returned but no permission inheritance is
/// resolved through it.
///
/// # Examples
///
/// ```
/// use warden_rbac::Role;
///
/// let role = Role::new(1, "Editor").unwrap();
/// assert_eq!(role.name, "editor");
/// assert!(!role.is_hydrated());
///
/// let role = role.with_permissions(Vec::new());
/// assert!(role.is_hydrated());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// Storage id.
    pub id: RoleId,

    /// Normalized (trimmed, lowercase) unique name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parent role. Inert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RoleId>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last update time.
    pub updated_at: DateTime<Utc>,

    /// Assigned permissions, `None` until hydrated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
}

impl Role {
    /// Create an unhydrated role, normalizing its name.
    ///
    /// # Errors
    ///
    /// [`RbacError::InvalidRoleName`] for a blank name.
    pub fn new(id: RoleId, name: &str) -> RbacResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: normalize_role_name(name)?,
            description: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
            permissions: None,
        })
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a known permission list.
    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Copy of this role with the permission list dropped.
    pub fn without_permissions(&self) -> Self {
        Self {
            permissions: None,
            ..self.clone()
        }
    }

    /// Whether the permission list has been loaded.
    pub fn is_hydrated(&self) -> bool {
        self.permissions.is_some()
    }
}

/// Trim and lowercase a role name.
///
/// # Errors
///
/// [`RbacError::InvalidRoleName`] when nothing is left after trimming.
///
/// # Examples
///
/// ```
/// use warden_rbac::roles::normalize_role_name;
///
/// assert_eq!(normalize_role_name("  Admin ").unwrap(), "admin");
/// assert!(normalize_role_name("   ").is_err());
/// ```
pub fn normalize_role_name(name: &str) -> RbacResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RbacError::InvalidRoleName(name.to_string()));
    }
    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionList;

    #[test]
    fn test_role_name_normalized() {
        let role = Role::new(3, " Analyst").unwrap();
        assert_eq!(role.name, "analyst");
        assert!(role.parent_id.is_none());
    }

    #[test]
    fn test_blank_role_name_rejected() {
        assert_eq!(
            Role::new(1, "").unwrap_err(),
            RbacError::InvalidRoleName(String::new())
        );
        assert!(normalize_role_name("\t\n").is_err());
    }

    #[test]
    fn test_hydration_marker() {
        let role = Role::new(1, "admin").unwrap();
        assert!(!role.is_hydrated());

        let perm = Permission::new(1, "*", &ActionList::any());
        let hydrated = role.with_permissions(vec![perm]);
        assert!(hydrated.is_hydrated());
        assert!(!hydrated.without_permissions().is_hydrated());
    }
}
