//! In-memory persistence adapter.
//!
//! Suitable for single-process hosts and testing. Mirrors the relational
//! layout: roles, permissions, a role/permission join and a role/user join,
//! each pair unique.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use warden_rbac::{NewPermission, Permission, PermissionId, Role, RoleId};

use crate::error::{StoreError, StoreResult};
use crate::store::{FindOptions, RbacStore};

#[derive(Debug, Default)]
struct Tables {
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    role_users: BTreeSet<(String, RoleId)>,
    next_role_id: RoleId,
    next_permission_id: PermissionId,
}

impl Tables {
    fn role(&self, id: RoleId, include_permissions: bool) -> Option<Role> {
        let role = self.roles.get(&id)?;
        if !include_permissions {
            return Some(role.clone());
        }
        let permissions = self
            .role_permissions
            .range((id, PermissionId::MIN)..=(id, PermissionId::MAX))
            .filter_map(|(_, pid)| self.permissions.get(pid).cloned())
            .collect();
        Some(role.clone().with_permissions(permissions))
    }

    fn require_role(&self, id: RoleId) -> StoreResult<()> {
        if self.roles.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("role {id}")))
        }
    }

    fn touch_role(&mut self, id: RoleId) {
        if let Some(role) = self.roles.get_mut(&id) {
            role.updated_at = Utc::now();
        }
    }
}

/// In-memory [`RbacStore`].
///
/// # Example
///
/// ```
/// use warden_authz::{MemoryStore, RbacStore};
///
/// # async fn example() -> Result<(), warden_authz::StoreError> {
/// let store = MemoryStore::new();
/// let (admin, created) = store.create_or_find_role("admin").await?;
/// assert!(created);
///
/// store.add_roles_to_user("42", &[admin.id]).await?;
/// assert_eq!(store.get_user_roles("42").await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    schema_present: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_role_id: 1,
                next_permission_id: 1,
                ..Tables::default()
            }),
            schema_present: AtomicBool::new(true),
        }
    }

    /// Create a store whose tables have not been created yet.
    ///
    /// Every call fails with [`StoreError::SchemaMissing`] until
    /// [`MemoryStore::migrate`] runs.
    pub fn without_schema() -> Self {
        let store = Self::new();
        store.schema_present.store(false, Ordering::SeqCst);
        store
    }

    /// Create the tables.
    pub fn migrate(&self) {
        self.schema_present.store(true, Ordering::SeqCst);
    }

    fn check_schema(&self) -> StoreResult<()> {
        if self.schema_present.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::SchemaMissing("table \"roles\" does not exist".to_string()))
        }
    }
}

#[async_trait]
impl RbacStore for MemoryStore {
    async fn find_role_by_id(&self, id: RoleId, include_permissions: bool) -> StoreResult<Option<Role>> {
        self.check_schema()?;
        Ok(self.tables.read().await.role(id, include_permissions))
    }

    async fn find_roles_by_ids(&self, ids: &[RoleId], include_permissions: bool) -> StoreResult<Vec<Role>> {
        self.check_schema()?;
        let tables = self.tables.read().await;
        let unique: BTreeSet<RoleId> = ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| tables.role(id, include_permissions))
            .collect())
    }

    async fn find_roles_by_names(&self, names: &[String]) -> StoreResult<Vec<Role>> {
        self.check_schema()?;
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .filter(|role| names.contains(&role.name))
            .cloned()
            .collect())
    }

    async fn find_all_roles(&self, options: FindOptions) -> StoreResult<Vec<Role>> {
        self.check_schema()?;
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .keys()
            .filter_map(|id| tables.role(*id, options.include_permissions))
            .collect())
    }

    async fn find_all_permissions(&self) -> StoreResult<Vec<Permission>> {
        self.check_schema()?;
        Ok(self.tables.read().await.permissions.values().cloned().collect())
    }

    async fn create_or_find_role(&self, name: &str) -> StoreResult<(Role, bool)> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.roles.values().find(|role| role.name == name) {
            return Ok((existing.clone(), false));
        }

        let id = tables.next_role_id;
        let role = Role::new(id, name).map_err(|e| StoreError::Backend(e.to_string()))?;
        tables.next_role_id += 1;
        tables.roles.insert(id, role.clone());
        Ok((role, true))
    }

    async fn delete_roles(&self, ids: &[RoleId]) -> StoreResult<Vec<RoleId>> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;

        let existing: BTreeSet<RoleId> = ids.iter().copied().filter(|id| tables.roles.contains_key(id)).collect();
        for id in &existing {
            if tables.role_users.iter().any(|(_, rid)| rid == id) {
                return Err(StoreError::Conflict(format!("role {id} is assigned to users")));
            }
            if tables.role_permissions.iter().any(|(rid, _)| rid == id) {
                return Err(StoreError::Conflict(format!("role {id} still holds permissions")));
            }
        }

        for id in &existing {
            tables.roles.remove(id);
        }
        Ok(existing.into_iter().collect())
    }

    async fn create_permissions(&self, permissions: &[NewPermission]) -> StoreResult<Vec<(Permission, bool)>> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;

        let mut results = Vec::with_capacity(permissions.len());
        for new in permissions {
            let name = new.name();
            if let Some(existing) = tables.permissions.values().find(|p| p.name == name) {
                results.push((existing.clone(), false));
                continue;
            }

            let id = tables.next_permission_id;
            tables.next_permission_id += 1;
            let mut permission = Permission::new(id, new.resource.clone(), &new.actions);
            permission.name = name;
            tables.permissions.insert(id, permission.clone());
            results.push((permission, true));
        }
        Ok(results)
    }

    async fn attach_permissions_to_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> StoreResult<()> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;
        tables.require_role(role_id)?;
        if let Some(missing) = permission_ids.iter().find(|id| !tables.permissions.contains_key(*id)) {
            return Err(StoreError::NotFound(format!("permission {missing}")));
        }

        for pid in permission_ids {
            tables.role_permissions.insert((role_id, *pid));
        }
        tables.touch_role(role_id);
        Ok(())
    }

    async fn detach_permissions_from_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> StoreResult<()> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;
        tables.require_role(role_id)?;

        for pid in permission_ids {
            tables.role_permissions.remove(&(role_id, *pid));
        }
        tables.touch_role(role_id);
        Ok(())
    }

    async fn get_user_roles(&self, user_pk: &str) -> StoreResult<Vec<Role>> {
        self.check_schema()?;
        let tables = self.tables.read().await;
        Ok(tables
            .role_users
            .iter()
            .filter(|(pk, _)| pk == user_pk)
            .filter_map(|(_, rid)| tables.role(*rid, false))
            .collect())
    }

    async fn add_roles_to_user(&self, user_pk: &str, role_ids: &[RoleId]) -> StoreResult<()> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;
        for rid in role_ids {
            tables.require_role(*rid)?;
        }
        for rid in role_ids {
            tables.role_users.insert((user_pk.to_string(), *rid));
        }
        Ok(())
    }

    async fn remove_roles_from_user(&self, user_pk: &str, role_ids: &[RoleId]) -> StoreResult<()> {
        self.check_schema()?;
        let mut tables = self.tables.write().await;
        for rid in role_ids {
            tables.role_users.remove(&(user_pk.to_string(), *rid));
        }
        Ok(())
    }
}
