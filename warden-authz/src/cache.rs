//! Role/permission cache
//!
//! Mirrors every role (with its permissions, once known) and every
//! permission in memory so authorization checks do not hit storage.
//! The cache follows storage writes through the [`EventBus`]: each lifecycle
//! event carries the data to apply, so no re-query is needed.
//!
//! ```text
//! init ──► subscribe (once per bus)
//!      └─► find_all_roles(with permissions) + find_all_permissions
//!
//! RolesCreated               -> insert, permissions = []
//! RolesDeleted               -> remove
//! PermissionsCreated         -> insert into perms
//! PermissionsAdded/Removed   -> replace the role entry
//! ```
//!
//! A role whose `permissions` is `None` is unhydrated: its permissions are
//! unknown and are fetched on first use.
//!
//! Events that arrive while a population is reading storage are journaled
//! and replayed over the snapshot it installs, so a write racing a rebuild
//! is never lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use warden_events::{EventBus, EventKind, RbacEvent, Subscription};
use warden_rbac::{Permission, PermissionId, Role, RoleId};

use crate::error::{AuthzResult, StoreError};
use crate::store::{FindOptions, RbacStore};

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached roles
    pub roles: usize,
    /// Cached roles whose permissions are known
    pub hydrated_roles: usize,
    /// Cached permissions
    pub permissions: usize,
    /// Whether the cache listens to the event bus
    pub subscribed: bool,
    /// Whether the cache has been populated from storage
    pub populated: bool,
}

#[derive(Debug, Default)]
struct CacheInner {
    roles: RwLock<HashMap<RoleId, Role>>,
    perms: RwLock<HashMap<PermissionId, Permission>>,
    populated: AtomicBool,
    populate_lock: tokio::sync::Mutex<()>,
    subscriptions: Mutex<Vec<Subscription>>,
    /// `Some` while a population is in flight.
    journal: Mutex<Option<Vec<RbacEvent>>>,
    schema_warned: AtomicBool,
}

impl CacheInner {
    fn roles(&self) -> RwLockReadGuard<'_, HashMap<RoleId, Role>> {
        self.roles.read().unwrap_or_else(|e| e.into_inner())
    }

    fn roles_mut(&self) -> RwLockWriteGuard<'_, HashMap<RoleId, Role>> {
        self.roles.write().unwrap_or_else(|e| e.into_inner())
    }

    fn journal(&self) -> MutexGuard<'_, Option<Vec<RbacEvent>>> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn perms(&self) -> RwLockReadGuard<'_, HashMap<PermissionId, Permission>> {
        self.perms.read().unwrap_or_else(|e| e.into_inner())
    }

    fn perms_mut(&self) -> RwLockWriteGuard<'_, HashMap<PermissionId, Permission>> {
        self.perms.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Role/permission cache handle.
///
/// Cheap to clone; clones share state. Reads and writes of the maps are
/// synchronous and never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct RbacCache {
    inner: Arc<CacheInner>,
}

impl RbacCache {
    /// Create an empty, unpopulated cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from storage and subscribe to `bus`.
    ///
    /// Always re-reads storage. Subscribing happens at most once per bus,
    /// however often this is called.
    ///
    /// # Errors
    ///
    /// Storage errors other than a missing schema.
    pub async fn init(&self, store: &dyn RbacStore, bus: &EventBus) -> AuthzResult<()> {
        let _guard = self.inner.populate_lock.lock().await;
        self.subscribe(bus);
        self.populate(store).await
    }

    /// Run [`RbacCache::init`] unless the cache is already populated.
    ///
    /// # Errors
    ///
    /// Storage errors other than a missing schema.
    pub async fn ensure_initialized(&self, store: &dyn RbacStore, bus: &EventBus) -> AuthzResult<()> {
        if self.is_populated() {
            return Ok(());
        }
        let _guard = self.inner.populate_lock.lock().await;
        self.subscribe(bus);
        if !self.is_populated() {
            self.populate(store).await?;
        }
        Ok(())
    }

    async fn populate(&self, store: &dyn RbacStore) -> AuthzResult<()> {
        *self.inner.journal() = Some(Vec::new());
        let loaded = async {
            let roles = store.find_all_roles(FindOptions::with_permissions()).await?;
            let perms = store.find_all_permissions().await?;
            Ok::<_, StoreError>((roles, perms))
        }
        .await;

        let (roles, perms) = match loaded {
            Ok(loaded) => loaded,
            Err(StoreError::SchemaMissing(reason)) => {
                if !self.inner.schema_warned.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        reason = %reason,
                        "RBAC tables missing, run the migrations; continuing with an empty role cache"
                    );
                }
                (Vec::new(), Vec::new())
            }
            Err(e) => {
                *self.inner.journal() = None;
                return Err(e.into());
            }
        };

        // Held until the replay is done so no event slips in between.
        let mut journal = self.inner.journal();
        let missed = journal.take().unwrap_or_default();

        self.set_roles(roles.into_iter().map(|r| (r.id, r)).collect());
        self.set_perms(perms.into_iter().map(|p| (p.id, p)).collect());
        for event in &missed {
            self.update_maps(event);
        }
        self.inner.populated.store(true, Ordering::SeqCst);
        drop(journal);

        tracing::debug!(replayed = missed.len(), "Role cache populated");
        Ok(())
    }

    /// Subscribe to every lifecycle event on `bus`, unless already
    /// subscribed to it. A shared cache may listen to several buses.
    ///
    /// Returns whether subscriptions were added.
    pub fn subscribe(&self, bus: &EventBus) -> bool {
        let mut subscriptions = self.inner.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
        if subscriptions.iter().any(|sub| sub.belongs_to(bus)) {
            return false;
        }

        for kind in EventKind::all() {
            let weak = Arc::downgrade(&self.inner);
            let sub = bus.on(kind, move |event| {
                if let Some(inner) = weak.upgrade() {
                    RbacCache { inner }.apply(&event.payload);
                }
            });
            subscriptions.push(sub);
        }
        true
    }

    /// Apply a lifecycle event.
    pub fn apply(&self, event: &RbacEvent) {
        let mut journal = self.inner.journal();
        if let Some(missed) = journal.as_mut() {
            missed.push(event.clone());
        }
        self.update_maps(event);
        drop(journal);
        tracing::debug!(kind = %event.kind(), "Role cache updated");
    }

    fn update_maps(&self, event: &RbacEvent) {
        match event {
            RbacEvent::RolesCreated { roles } => {
                let mut cached = self.inner.roles_mut();
                for role in roles {
                    // New roles have no permissions; mark them known-empty.
                    let role = Role {
                        permissions: Some(role.permissions.clone().unwrap_or_default()),
                        ..role.clone()
                    };
                    cached.insert(role.id, role);
                }
            }
            RbacEvent::RolesDeleted { role_ids } => {
                let mut cached = self.inner.roles_mut();
                for id in role_ids {
                    cached.remove(id);
                }
            }
            RbacEvent::PermissionsCreated { permissions } => {
                let mut cached = self.inner.perms_mut();
                for perm in permissions {
                    cached.insert(perm.id, perm.clone());
                }
            }
            RbacEvent::PermissionsAddedToRole { role } | RbacEvent::PermissionsRemovedFromRole { role } => {
                self.inner.roles_mut().insert(role.id, role.clone());
            }
        }
    }

    /// Snapshot of all cached roles.
    pub fn roles(&self) -> HashMap<RoleId, Role> {
        self.inner.roles().clone()
    }

    /// Snapshot of all cached permissions.
    pub fn perms(&self) -> HashMap<PermissionId, Permission> {
        self.inner.perms().clone()
    }

    /// One cached role.
    pub fn role(&self, id: RoleId) -> Option<Role> {
        self.inner.roles().get(&id).cloned()
    }

    /// Replace the role map.
    pub fn set_roles(&self, roles: HashMap<RoleId, Role>) {
        *self.inner.roles_mut() = roles;
    }

    /// Replace the permission map.
    pub fn set_perms(&self, perms: HashMap<PermissionId, Permission>) {
        *self.inner.perms_mut() = perms;
    }

    /// All cached roles, each with its permissions.
    ///
    /// Unhydrated roles are fetched in a single batched query and merged
    /// into the cache. When every role is already hydrated storage is not
    /// touched.
    ///
    /// # Errors
    ///
    /// The storage error of the batched fetch.
    pub async fn roles_with_permissions(&self, store: &dyn RbacStore) -> AuthzResult<HashMap<RoleId, Role>> {
        let missing: Vec<RoleId> = self
            .inner
            .roles()
            .values()
            .filter(|role| !role.is_hydrated())
            .map(|role| role.id)
            .collect();
        if missing.is_empty() {
            return Ok(self.roles());
        }

        tracing::debug!(count = missing.len(), "Hydrating role permissions");
        let fetched = store.find_roles_by_ids(&missing, true).await?;

        let mut cached = self.inner.roles_mut();
        for role in fetched {
            // An event may have replaced or removed the entry meanwhile.
            if let Some(entry) = cached.get_mut(&role.id).filter(|entry| !entry.is_hydrated()) {
                *entry = role;
            }
        }
        Ok(cached.clone())
    }

    /// Permissions of one role, fetching and caching them if unknown.
    ///
    /// A role storage no longer knows has no permissions.
    ///
    /// # Errors
    ///
    /// The storage error of the fetch.
    pub async fn role_permissions(&self, store: &dyn RbacStore, role_id: RoleId) -> AuthzResult<Vec<Permission>> {
        if let Some(permissions) = self.inner.roles().get(&role_id).and_then(|r| r.permissions.clone()) {
            return Ok(permissions);
        }

        tracing::debug!(role_id, "Hydrating role permissions");
        let fetched = store.find_roles_by_ids(&[role_id], true).await?;
        let Some(role) = fetched.into_iter().find(|r| r.id == role_id) else {
            tracing::debug!(role_id, "Role not found while hydrating");
            return Ok(Vec::new());
        };

        let permissions = role.permissions.clone().unwrap_or_default();
        let mut cached = self.inner.roles_mut();
        match cached.get_mut(&role_id) {
            Some(entry) if entry.is_hydrated() => Ok(entry.permissions.clone().unwrap_or_default()),
            Some(entry) => {
                *entry = role.with_permissions(permissions.clone());
                Ok(permissions)
            }
            None => Ok(permissions),
        }
    }

    /// Whether the cache has been populated since creation or the last reset.
    pub fn is_populated(&self) -> bool {
        self.inner.populated.load(Ordering::SeqCst)
    }

    /// Whether the cache listens to an event bus.
    pub fn is_subscribed(&self) -> bool {
        !self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Empty both maps; the next [`RbacCache::ensure_initialized`] repopulates.
    ///
    /// Event subscriptions are kept.
    pub fn reset(&self) {
        self.inner.roles_mut().clear();
        self.inner.perms_mut().clear();
        self.inner.populated.store(false, Ordering::SeqCst);
    }

    /// Reset and unsubscribe from the event bus.
    pub fn dispose(&self) {
        let subscriptions: Vec<Subscription> = std::mem::take(
            &mut *self.inner.subscriptions.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for sub in subscriptions {
            sub.unsubscribe();
        }
        self.reset();
    }

    /// Get cache stats.
    pub fn stats(&self) -> CacheStats {
        let roles = self.inner.roles();
        CacheStats {
            roles: roles.len(),
            hydrated_roles: roles.values().filter(|r| r.is_hydrated()).count(),
            permissions: self.inner.perms().len(),
            subscribed: self.is_subscribed(),
            populated: self.is_populated(),
        }
    }
}
