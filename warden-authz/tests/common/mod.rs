//! Shared fixtures for the warden-authz integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warden_authz::{
    ActionList, AuthzConfig, Authorizer, FindOptions, MemoryStore, NewPermission, Permission, PermissionId,
    RbacStore, Role, RoleId, StoreError, StoreResult, UserKey,
};

/// Store wrapper that counts calls and can slow down or fail lookups of
/// individual roles.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<HashMap<&'static str, usize>>,
    hydrations: Mutex<Vec<RoleId>>,
    slow_roles: Mutex<HashMap<RoleId, Duration>>,
    failing_roles: Mutex<Vec<RoleId>>,
    slow_population: Mutex<Option<Duration>>,
    total: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_schema() -> Self {
        Self {
            inner: MemoryStore::without_schema(),
            ..Self::default()
        }
    }

    pub fn migrate(&self) {
        self.inner.migrate();
    }

    /// Delay every lookup that includes `role_id`.
    pub fn slow_down(&self, role_id: RoleId, delay: Duration) {
        self.slow_roles.lock().unwrap().insert(role_id, delay);
    }

    /// Hold `find_all_roles` results for `delay` after reading them, so
    /// writes can land while the snapshot is in flight.
    pub fn slow_down_population(&self, delay: Duration) {
        *self.slow_population.lock().unwrap() = Some(delay);
    }

    /// Fail every lookup that includes `role_id`.
    pub fn fail(&self, role_id: RoleId) {
        self.failing_roles.lock().unwrap().push(role_id);
    }

    /// Number of calls to `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Number of store calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Role ids passed to `find_roles_by_ids`, in call order.
    pub fn hydrated(&self) -> Vec<RoleId> {
        self.hydrations.lock().unwrap().clone()
    }

    pub fn reset_counters(&self) {
        self.calls.lock().unwrap().clear();
        self.hydrations.lock().unwrap().clear();
        self.total.store(0, Ordering::SeqCst);
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    async fn intercept(&self, ids: &[RoleId]) -> StoreResult<()> {
        let delay = {
            let slow = self.slow_roles.lock().unwrap();
            ids.iter().filter_map(|id| slow.get(id).copied()).max()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.failing_roles.lock().unwrap().clone();
        if let Some(id) = ids.iter().find(|id| failing.contains(id)) {
            return Err(StoreError::Backend(format!("connection reset while reading role {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RbacStore for RecordingStore {
    async fn find_role_by_id(&self, id: RoleId, include_permissions: bool) -> StoreResult<Option<Role>> {
        self.record("find_role_by_id");
        self.intercept(&[id]).await?;
        self.inner.find_role_by_id(id, include_permissions).await
    }

    async fn find_roles_by_ids(&self, ids: &[RoleId], include_permissions: bool) -> StoreResult<Vec<Role>> {
        self.record("find_roles_by_ids");
        self.hydrations.lock().unwrap().extend_from_slice(ids);
        self.intercept(ids).await?;
        self.inner.find_roles_by_ids(ids, include_permissions).await
    }

    async fn find_roles_by_names(&self, names: &[String]) -> StoreResult<Vec<Role>> {
        self.record("find_roles_by_names");
        self.inner.find_roles_by_names(names).await
    }

    async fn find_all_roles(&self, options: FindOptions) -> StoreResult<Vec<Role>> {
        self.record("find_all_roles");
        let roles = self.inner.find_all_roles(options).await?;
        let delay = *self.slow_population.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(roles)
    }

    async fn find_all_permissions(&self) -> StoreResult<Vec<Permission>> {
        self.record("find_all_permissions");
        self.inner.find_all_permissions().await
    }

    async fn create_or_find_role(&self, name: &str) -> StoreResult<(Role, bool)> {
        self.record("create_or_find_role");
        self.inner.create_or_find_role(name).await
    }

    async fn delete_roles(&self, ids: &[RoleId]) -> StoreResult<Vec<RoleId>> {
        self.record("delete_roles");
        self.inner.delete_roles(ids).await
    }

    async fn create_permissions(&self, permissions: &[NewPermission]) -> StoreResult<Vec<(Permission, bool)>> {
        self.record("create_permissions");
        self.inner.create_permissions(permissions).await
    }

    async fn attach_permissions_to_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> StoreResult<()> {
        self.record("attach_permissions_to_role");
        self.inner.attach_permissions_to_role(role_id, permission_ids).await
    }

    async fn detach_permissions_from_role(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> StoreResult<()> {
        self.record("detach_permissions_from_role");
        self.inner.detach_permissions_from_role(role_id, permission_ids).await
    }

    async fn get_user_roles(&self, user_pk: &str) -> StoreResult<Vec<Role>> {
        self.record("get_user_roles");
        self.inner.get_user_roles(user_pk).await
    }

    async fn add_roles_to_user(&self, user_pk: &str, role_ids: &[RoleId]) -> StoreResult<()> {
        self.record("add_roles_to_user");
        self.inner.add_roles_to_user(user_pk, role_ids).await
    }

    async fn remove_roles_from_user(&self, user_pk: &str, role_ids: &[RoleId]) -> StoreResult<()> {
        self.record("remove_roles_from_user");
        self.inner.remove_roles_from_user(user_pk, role_ids).await
    }
}

/// An authorizer over a [`RecordingStore`].
pub struct TestFixture {
    pub store: Arc<RecordingStore>,
    pub authz: Authorizer,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(AuthzConfig::default())
    }

    pub fn with_config(config: AuthzConfig) -> Self {
        Self::over(Arc::new(RecordingStore::new()), config)
    }

    pub fn over(store: Arc<RecordingStore>, config: AuthzConfig) -> Self {
        let authz = Authorizer::with_config(store.clone(), config).expect("valid config");
        Self { store, authz }
    }

    /// Create a role holding one permission per `(resource, actions)` pair.
    pub async fn role_with(&self, name: &str, grants: &[(&str, &[&str])]) -> Role {
        let (role, _) = self.authz.create_role(name).await.expect("create role");
        if grants.is_empty() {
            return role;
        }
        let new: Vec<NewPermission> = grants
            .iter()
            .map(|(resource, actions)| NewPermission::new(*resource, ActionList::new(actions.iter().copied())))
            .collect();
        let perms = self.authz.create_permissions(new).await.expect("create permissions");
        let ids: Vec<PermissionId> = perms.iter().map(|p| p.id).collect();
        self.authz
            .add_permissions_to_role(role.id, &ids)
            .await
            .expect("attach permissions")
    }

    /// A user holding `roles`.
    pub async fn user_with(&self, pk: &str, roles: &[&Role]) -> UserKey {
        let user = UserKey::new(pk);
        let ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
        self.authz.add_roles_to_user(&user, &ids).await.expect("assign roles");
        user
    }
}
