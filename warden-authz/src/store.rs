//! Persistence adapter
//!
//! The authorization engine never talks to a database directly. Hosts
//! implement [`RbacStore`] over their own tables (roles, permissions,
//! role_permissions, role_users); [`crate::memory::MemoryStore`] is the
//! in-process reference implementation.

use async_trait::async_trait;
use warden_rbac::{NewPermission, Permission, PermissionId, Role, RoleId};

use crate::error::StoreResult;

/// Options for [`RbacStore::find_all_roles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Join each role's permissions, returning hydrated roles.
    pub include_permissions: bool,
}

impl FindOptions {
    /// Roles together with their permissions.
    pub fn with_permissions() -> Self {
        Self {
            include_permissions: true,
        }
    }
}

/// Storage operations the engine consumes.
///
/// Role names passed in are already normalized. Roles are returned with
/// `permissions: Some(..)` exactly when permissions were requested.
///
/// A store must report missing tables as
/// [`StoreError::SchemaMissing`](crate::error::StoreError::SchemaMissing);
/// cache population tolerates that one error.
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Fetch one role.
    async fn find_role_by_id(&self, id: RoleId, include_permissions: bool) -> StoreResult<Option<Role>>;

    /// Fetch several roles in one query. Unknown ids are skipped.
    async fn find_roles_by_ids(&self, ids: &[RoleId], include_permissions: bool) -> StoreResult<Vec<Role>>;

    /// Fetch roles by normalized name. Unknown names are skipped.
    async fn find_roles_by_names(&self, names: &[String]) -> StoreResult<Vec<Role>>;

    /// Fetch every role.
    async fn find_all_roles(&self, options: FindOptions) -> StoreResult<Vec<Role>>;

    /// Fetch every permission.
    async fn find_all_permissions(&self) -> StoreResult<Vec<Permission>>;

    /// Find the role called `name`, creating it when absent.
    ///
    /// Returns the role and whether it was created by this call.
    async fn create_or_find_role(&self, name: &str) -> StoreResult<(Role, bool)>;

    /// Delete roles.
    ///
    /// Fails with `Conflict` when a role is still assigned to a user or
    /// still holds permissions. Returns the ids actually deleted.
    async fn delete_roles(&self, ids: &[RoleId]) -> StoreResult<Vec<RoleId>>;

    /// Find or create permissions by name.
    ///
    /// Returns each permission with whether this call created it.
    async fn create_permissions(&self, permissions: &[NewPermission]) -> StoreResult<Vec<(Permission, bool)>>;

    /// Attach permissions to a role. Already attached pairs are left alone.
    async fn attach_permissions_to_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> StoreResult<()>;

    /// Detach permissions from a role. Pairs that are not attached are ignored.
    async fn detach_permissions_from_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> StoreResult<()>;

    /// Roles assigned to the user with primary key `user_pk`, without permissions.
    async fn get_user_roles(&self, user_pk: &str) -> StoreResult<Vec<Role>>;

    /// Assign roles to a user. Already assigned roles are left alone.
    async fn add_roles_to_user(&self, user_pk: &str, role_ids: &[RoleId]) -> StoreResult<()>;

    /// Unassign roles from a user.
    async fn remove_roles_from_user(&self, user_pk: &str, role_ids: &[RoleId]) -> StoreResult<()>;
}
