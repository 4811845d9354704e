//! Write operations
//!
//! Every mutation goes through the store first and then announces itself on
//! the event bus, which is how the role/permission cache stays current.
//! Input is validated before the store is touched.

use warden_events::RbacEvent;
use warden_rbac::{normalize_role_name, NewPermission, Permission, PermissionId, Role, RoleId};

use crate::authorizer::Authorizer;
use crate::error::{AuthzError, AuthzResult};
use crate::user::AuthorizableUser;

impl Authorizer {
    /// Find or create the role called `name`.
    ///
    /// The name is trimmed and lowercased. `RolesCreated` is emitted only
    /// when the role did not exist yet.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Validation`] for a blank name, before any store call.
    pub async fn create_role(&self, name: &str) -> AuthzResult<(Role, bool)> {
        let name = normalize_role_name(name)?;
        let (role, created) = self.store.create_or_find_role(&name).await?;

        if created {
            tracing::debug!(role_id = role.id, role = %role.name, "Role created");
            self.bus.emit(RbacEvent::RolesCreated {
                roles: vec![role.clone()],
            });
        }
        Ok((role, created))
    }

    /// Find or create several roles, emitting one `RolesCreated` for the new ones.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Validation`] if any name is blank; nothing is written then.
    pub async fn create_roles(&self, names: &[&str]) -> AuthzResult<Vec<Role>> {
        let names = names
            .iter()
            .map(|name| normalize_role_name(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut roles = Vec::with_capacity(names.len());
        let mut created = Vec::new();
        for name in &names {
            let (role, is_new) = self.store.create_or_find_role(name).await?;
            if is_new {
                created.push(role.clone());
            }
            roles.push(role);
        }

        if !created.is_empty() {
            tracing::debug!(count = created.len(), "Roles created");
            self.bus.emit(RbacEvent::RolesCreated { roles: created });
        }
        Ok(roles)
    }

    /// Look up a role by name. The name is normalized first.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Validation`] for a blank name, or the storage error.
    pub async fn find_role(&self, name: &str) -> AuthzResult<Option<Role>> {
        let name = normalize_role_name(name)?;
        let mut roles = self.store.find_roles_by_names(&[name]).await?;
        Ok(roles.pop())
    }

    /// Delete roles and emit `RolesDeleted` with the ids actually removed.
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` while a role is still referenced.
    pub async fn delete_roles(&self, ids: &[RoleId]) -> AuthzResult<Vec<RoleId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let deleted = self.store.delete_roles(ids).await?;

        if !deleted.is_empty() {
            tracing::debug!(count = deleted.len(), "Roles deleted");
            self.bus.emit(RbacEvent::RolesDeleted {
                role_ids: deleted.clone(),
            });
        }
        Ok(deleted)
    }

    /// Find or create permissions by name.
    ///
    /// Returns every requested permission in order; `PermissionsCreated`
    /// carries only the ones this call created.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Validation`] if any permission is invalid; nothing is
    /// written then.
    pub async fn create_permissions(&self, permissions: Vec<NewPermission>) -> AuthzResult<Vec<Permission>> {
        for permission in &permissions {
            permission.validate()?;
        }
        if permissions.is_empty() {
            return Ok(Vec::new());
        }

        let results = self.store.create_permissions(&permissions).await?;
        let created: Vec<Permission> = results
            .iter()
            .filter(|(_, is_new)| *is_new)
            .map(|(permission, _)| permission.clone())
            .collect();

        if !created.is_empty() {
            tracing::debug!(count = created.len(), "Permissions created");
            self.bus.emit(RbacEvent::PermissionsCreated { permissions: created });
        }
        Ok(results.into_iter().map(|(permission, _)| permission).collect())
    }

    /// Attach permissions to a role and emit `PermissionsAddedToRole` with
    /// the role's full permission set as stored.
    ///
    /// # Errors
    ///
    /// The storage error, or [`AuthzError::RoleNotFound`] if the role
    /// vanished before it could be re-read.
    pub async fn add_permissions_to_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> AuthzResult<Role> {
        self.store.attach_permissions_to_role(role_id, permission_ids).await?;
        let role = self.reload_role(role_id).await?;

        tracing::debug!(role_id, added = permission_ids.len(), "Permissions added to role");
        self.bus.emit(RbacEvent::PermissionsAddedToRole { role: role.clone() });
        Ok(role)
    }

    /// Detach permissions from a role and emit `PermissionsRemovedFromRole`
    /// with the role's remaining permissions.
    ///
    /// # Errors
    ///
    /// As [`Authorizer::add_permissions_to_role`].
    pub async fn remove_permissions_from_role(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AuthzResult<Role> {
        self.store.detach_permissions_from_role(role_id, permission_ids).await?;
        let role = self.reload_role(role_id).await?;

        tracing::debug!(role_id, removed = permission_ids.len(), "Permissions removed from role");
        self.bus.emit(RbacEvent::PermissionsRemovedFromRole { role: role.clone() });
        Ok(role)
    }

    /// Assign roles to a user and drop the user's cached role list.
    ///
    /// # Errors
    ///
    /// The storage error.
    pub async fn add_roles_to_user(&self, user: &impl AuthorizableUser, role_ids: &[RoleId]) -> AuthzResult<()> {
        let pk = user.primary_key();
        self.store.add_roles_to_user(&pk, role_ids).await?;
        self.user_cache.remove(&self.user_cache.key_for(user));

        tracing::debug!(user = %pk, count = role_ids.len(), "Roles assigned to user");
        Ok(())
    }

    /// Unassign roles from a user and drop the user's cached role list.
    ///
    /// # Errors
    ///
    /// The storage error.
    pub async fn remove_roles_from_user(&self, user: &impl AuthorizableUser, role_ids: &[RoleId]) -> AuthzResult<()> {
        let pk = user.primary_key();
        self.store.remove_roles_from_user(&pk, role_ids).await?;
        self.user_cache.remove(&self.user_cache.key_for(user));

        tracing::debug!(user = %pk, count = role_ids.len(), "Roles unassigned from user");
        Ok(())
    }

    async fn reload_role(&self, role_id: RoleId) -> AuthzResult<Role> {
        self.store
            .find_role_by_id(role_id, true)
            .await?
            .ok_or(AuthzError::RoleNotFound(role_id))
    }
}
