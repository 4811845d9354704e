//! # Permissions
//!
//! Stored permission records and the input used to create them.
//! A permission grants an ordered list of actions on one resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::{ActionList, WILDCARD};
use crate::error::{RbacError, RbacResult};

/// Numeric permission identifier assigned by storage.
pub type PermissionId = i64;

/// A permission as stored.
///
/// `action` keeps the serialized column form; use [`Permission::actions`] to
/// decode it. Permissions are never edited: a different action set is a
/// different permission (duplicates are detected by `name`).
///
/// # Example
///
/// ```
/// use warden_rbac::permissions::Permission;
/// use warden_rbac::actions::ActionList;
///
/// let perm = Permission::new(1, "blog", &ActionList::new(["view", "edit"]));
/// assert_eq!(perm.name, "blog:[view,edit]");
/// assert!(perm.actions().unwrap().grants("edit"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    /// Storage id.
    pub id: PermissionId,
    /// Unique name.
    pub name: String,
    /// Resource the permission applies to, `*` for all resources.
    pub resource: String,
    /// Serialized action list (JSON array).
    pub action: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// Build a record with a derived name.
    pub fn new(id: PermissionId, resource: impl Into<String>, actions: &ActionList) -> Self {
        let resource = resource.into();
        Self {
            id,
            name: derive_name(&resource, actions),
            resource,
            action: actions.encode(),
            created_at: Utc::now(),
        }
    }

    /// Decode the granted actions.
    ///
    /// Returns `None` when the stored column is malformed; such a record
    /// grants nothing.
    pub fn actions(&self) -> Option<ActionList> {
        ActionList::decode(&self.action).ok()
    }

    /// Whether the resource is the `*` wildcard.
    pub fn is_global(&self) -> bool {
        self.resource == WILDCARD
    }
}

/// Input for creating a permission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPermission {
    /// Explicit name; derived from resource and actions when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Resource, `*` for all.
    pub resource: String,
    /// Granted actions.
    pub actions: ActionList,
}

impl NewPermission {
    /// Create a permission definition with a derived name.
    pub fn new(resource: impl Into<String>, actions: ActionList) -> Self {
        Self {
            name: None,
            resource: resource.into(),
            actions,
        }
    }

    /// Override the derived name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name this permission will be stored under.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => derive_name(&self.resource, &self.actions),
        }
    }

    /// Reject definitions that could never grant anything.
    ///
    /// # Errors
    ///
    /// [`RbacError::InvalidPermission`] for a blank resource, an empty action
    /// list, a blank action, or a blank explicit name.
    pub fn validate(&self) -> RbacResult<()> {
        if self.resource.trim().is_empty() {
            return Err(RbacError::InvalidPermission("resource is blank".to_string()));
        }
        if self.actions.is_empty() {
            return Err(RbacError::InvalidPermission(format!(
                "no actions given for resource {}",
                self.resource
            )));
        }
        if self.actions.iter().any(|a| a.trim().is_empty()) {
            return Err(RbacError::InvalidPermission(format!(
                "blank action for resource {}",
                self.resource
            )));
        }
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(RbacError::InvalidPermission("name is blank".to_string()));
        }
        Ok(())
    }
}

/// `"<resource>:[<comma-joined-actions>]"`
fn derive_name(resource: &str, actions: &ActionList) -> String {
    format!("{}:[{}]", resource, actions)
}
