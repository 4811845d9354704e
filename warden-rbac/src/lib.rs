//! # Warden RBAC
//!
//! Role and permission model plus the permission matcher used by the
//! Warden authorization engine.
//!
//! ## Overview
//!
//! The warden-rbac crate handles:
//! - **Roles**: Named groups of permissions, assigned to users
//! - **Permissions**: An ordered action list granted on one resource
//! - **Actions**: Free-form operation names, `*` for all
//! - **Matching**: Evaluating `"<action> <resource>"` requests against grants
//!
//! ## Architecture
//!
//! ```text
//! Permission = Resource + [Action, ...]
//!
//! Examples:
//!   blog:[view,edit]     - view and edit the blog resource
//!   *:[view]             - view any resource
//!   *:[*]                - everything
//!   blog.title:[edit]    - edit only the title field of blog
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use warden_rbac::{resolve_permission, ActionList, Permission};
//!
//! let granted = vec![
//!     Permission::new(1, "blog", &ActionList::new(["view", "edit"])),
//!     Permission::new(2, "*", &ActionList::new(["view"])),
//! ];
//!
//! assert!(resolve_permission(&granted, "edit blog"));
//! assert!(resolve_permission(&granted, "view invoices"));
//! assert!(!resolve_permission(&granted, "delete blog"));
//! assert!(!resolve_permission(&granted, "*"));
//! ```
//!
//! ## Role hierarchy
//!
//! Roles carry an optional `parent_id`, but permissions are never inherited
//! through it. A role grants exactly the permissions attached to it.

pub mod actions;
pub mod error;
pub mod matcher;
pub mod permissions;
pub mod roles;

// Re-export main types for convenience
pub use actions::{ActionList, WILDCARD};
pub use error::{RbacError, RbacResult};
pub use matcher::{resolve_permission, PermissionRequest};
pub use permissions::{NewPermission, Permission, PermissionId};
pub use roles::{normalize_role_name, Role, RoleId};
