//! # Warden Authz
//!
//! Authorization engine for Warden: answers whether a user may perform an
//! action on a resource, or holds a role, without hitting storage on every
//! check.
//!
//! ## Overview
//!
//! The warden-authz crate handles:
//! - **Authorizer**: The facade hosts call (`user_can`, `user_is_a`, ...)
//! - **Role/Permission Cache**: Every role and permission, kept current by events
//! - **User Role Cache**: Per-user role lists with a TTL
//! - **Storage**: The [`RbacStore`] adapter trait and an in-memory store
//!
//! ## Architecture
//!
//! ```text
//! user_can(user, "edit blog")
//!   -> UserRoleCache ---miss---> RbacStore::get_user_roles
//!   -> RbacCache::role_permissions (per role, concurrently)
//!   -> warden_rbac::resolve_permission
//!
//! create_role / add_permissions_to_role / ...
//!   -> RbacStore write
//!   -> EventBus::emit --> RbacCache::apply
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_authz::{AuthzConfig, Authorizer, MemoryStore, UserKey};
//!
//! # async fn example() -> warden_authz::AuthzResult<()> {
//! let config = AuthzConfig::from_env()?;
//! let authz = Authorizer::with_config(Arc::new(MemoryStore::new()), config)?;
//! authz.init().await?;
//!
//! let user = UserKey::new("15");
//! if authz.user_cant(&user, "delete invoices").await? {
//!     println!("denied");
//! }
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod authorizer;
pub mod cache;
pub mod config;
pub mod error;
#[cfg(feature = "memory")]
pub mod memory;
pub mod store;
pub mod user;
pub mod user_cache;

// Re-export main types for convenience
pub use authorizer::Authorizer;
pub use cache::{CacheStats, RbacCache};
pub use config::{AuthzConfig, ConfigError};
pub use error::{AuthzError, AuthzResult, StoreError, StoreResult};
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use store::{FindOptions, RbacStore};
pub use user::{AuthorizableUser, UserKey};
pub use user_cache::UserRoleCache;

pub use warden_events::{EventBus, EventKind, RbacEvent, Subscription};
pub use warden_rbac::{ActionList, NewPermission, Permission, PermissionId, Role, RoleId};
