//! Authorization facade
//!
//! [`Authorizer`] answers "can this user do X" by combining the user role
//! cache, the role/permission cache and the permission matcher. Storage is
//! only consulted on cache misses.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use warden_events::{EventBus, EventKind, RbacEvent, Subscription};
use warden_rbac::{resolve_permission, Permission, Role, RoleId};

use crate::cache::{CacheStats, RbacCache};
use crate::config::AuthzConfig;
use crate::error::{AuthzError, AuthzResult};
use crate::store::RbacStore;
use crate::user::AuthorizableUser;
use crate::user_cache::UserRoleCache;

/// Authorization facade.
///
/// Owns the caches and the event bus they listen to. The role/permission
/// cache is populated lazily on first use, or explicitly with
/// [`Authorizer::init`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use warden_authz::{Authorizer, MemoryStore, UserKey};
/// use warden_rbac::{ActionList, NewPermission};
///
/// # async fn example() -> warden_authz::AuthzResult<()> {
/// let authz = Authorizer::new(Arc::new(MemoryStore::new()));
///
/// let (editor, _) = authz.create_role("Editor").await?;
/// let perms = authz
///     .create_permissions(vec![NewPermission::new("blog", ActionList::new(["view", "edit"]))])
///     .await?;
/// authz.add_permissions_to_role(editor.id, &[perms[0].id]).await?;
///
/// let user = UserKey::new(42);
/// authz.add_roles_to_user(&user, &[editor.id]).await?;
///
/// assert!(authz.user_can(&user, "edit blog").await?);
/// assert!(authz.user_is_a(&user, "editor").await?);
/// # Ok(())
/// # }
/// ```
pub struct Authorizer {
    pub(crate) store: Arc<dyn RbacStore>,
    pub(crate) bus: EventBus,
    pub(crate) cache: RbacCache,
    pub(crate) user_cache: UserRoleCache,
    pub(crate) config: AuthzConfig,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("config", &self.config)
            .field("cache", &self.cache_stats())
            .finish()
    }
}

impl Authorizer {
    /// Create an authorizer with the default configuration.
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        let config = AuthzConfig::default();
        Self {
            store,
            bus: EventBus::new(),
            cache: RbacCache::new(),
            user_cache: UserRoleCache::new(config.cache_user_roles, config.user_cache_prefix.clone()),
            config,
        }
    }

    /// Create an authorizer with a custom configuration.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Config`] when the configuration does not validate.
    pub fn with_config(store: Arc<dyn RbacStore>, config: AuthzConfig) -> AuthzResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            bus: EventBus::new(),
            cache: RbacCache::new(),
            user_cache: UserRoleCache::new(config.cache_user_roles, config.user_cache_prefix.clone()),
            config,
        })
    }

    /// Publish lifecycle events on `bus` instead of a private one.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Use an existing role/permission cache.
    ///
    /// The cache subscribes to this authorizer's bus on first use, in
    /// addition to any bus it already follows.
    pub fn with_cache(mut self, cache: RbacCache) -> Self {
        self.cache = cache;
        self
    }

    /// The persistence adapter.
    pub fn store(&self) -> &Arc<dyn RbacStore> {
        &self.store
    }

    /// The event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The configuration.
    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Cache management
    // ------------------------------------------------------------------

    /// Populate the role/permission cache and subscribe it to the bus.
    ///
    /// # Errors
    ///
    /// Storage errors other than a missing schema.
    pub async fn init(&self) -> AuthzResult<()> {
        self.cache.init(self.store.as_ref(), &self.bus).await
    }

    /// The role/permission cache, populated on first access.
    ///
    /// # Errors
    ///
    /// Storage errors other than a missing schema.
    pub async fn cache(&self) -> AuthzResult<&RbacCache> {
        self.cache.ensure_initialized(self.store.as_ref(), &self.bus).await?;
        Ok(&self.cache)
    }

    /// Counters of the role/permission cache, without populating it.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Empty the role/permission cache; it repopulates on next access.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    /// The user role cache.
    pub fn user_cache(&self) -> &UserRoleCache {
        &self.user_cache
    }

    /// Drop every user role cache entry.
    pub fn reset_user_cache(&self) {
        self.user_cache.flush_all();
    }

    /// Unsubscribe the cache from the bus and empty both caches.
    pub fn dispose(&self) {
        self.cache.dispose();
        self.user_cache.flush_all();
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// The user's roles, from the user role cache when possible.
    ///
    /// # Errors
    ///
    /// The storage error of the role lookup.
    pub async fn user_roles(&self, user: &impl AuthorizableUser) -> AuthzResult<Vec<Role>> {
        let key = self.user_cache.key_for(user);
        if let Some(roles) = self.user_cache.get(&key) {
            return Ok(roles);
        }

        let roles = self.store.get_user_roles(&user.primary_key()).await?;
        self.user_cache.set(key, roles.clone(), self.config.user_cache_ttl);
        Ok(roles)
    }

    /// Whether any of the user's roles grants `permission`.
    ///
    /// `permission` is `"*"`, `"<action> <resource>"` or
    /// `"<action> <field> <resource>"`. Every role is resolved concurrently;
    /// the first granting role wins and the remaining lookups are dropped.
    /// A user without roles can do nothing.
    ///
    /// # Errors
    ///
    /// A storage error from a role lookup, only when no role granted the
    /// permission.
    pub async fn user_can(&self, user: &impl AuthorizableUser, permission: &str) -> AuthzResult<bool> {
        let roles = self.user_roles(user).await?;
        if roles.is_empty() {
            return Ok(false);
        }

        let cache = self.cache().await?;
        let store = self.store.as_ref();

        let mut pending: FuturesUnordered<_> = roles
            .iter()
            .map(|role| async move {
                let permissions: Vec<Permission> = cache.role_permissions(store, role.id).await?;
                Ok::<(RoleId, bool), AuthzError>((role.id, resolve_permission(&permissions, permission)))
            })
            .collect();

        let mut failure = None;
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok((role_id, true)) => {
                    tracing::debug!(role_id, permission, "Permission granted");
                    return Ok(true);
                }
                Ok((_, false)) => {}
                Err(e) => {
                    tracing::debug!(error = %e, permission, "Role permission lookup failed");
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    /// Negation of [`Authorizer::user_can`].
    ///
    /// # Errors
    ///
    /// As [`Authorizer::user_can`].
    pub async fn user_cant(&self, user: &impl AuthorizableUser, permission: &str) -> AuthzResult<bool> {
        Ok(!self.user_can(user, permission).await?)
    }

    /// Whether the user holds the role called exactly `role_name`.
    ///
    /// Stored names are lowercase, so `"Admin"` never matches.
    ///
    /// # Errors
    ///
    /// The storage error of the role lookup.
    pub async fn user_is_a(&self, user: &impl AuthorizableUser, role_name: &str) -> AuthzResult<bool> {
        let roles = self.user_roles(user).await?;
        Ok(roles.iter().any(|role| role.name == role_name))
    }

    /// Alias of [`Authorizer::user_is_a`].
    ///
    /// # Errors
    ///
    /// The storage error of the role lookup.
    pub async fn user_is_an(&self, user: &impl AuthorizableUser, role_name: &str) -> AuthzResult<bool> {
        self.user_is_a(user, role_name).await
    }

    /// Whether the user holds at least one of `role_names`.
    ///
    /// # Errors
    ///
    /// The storage error of the role lookup.
    pub async fn user_has_roles(&self, user: &impl AuthorizableUser, role_names: &[&str]) -> AuthzResult<bool> {
        let roles = self.user_roles(user).await?;
        Ok(roles.iter().any(|role| role_names.contains(&role.name.as_str())))
    }

    /// Whether the user holds every one of `role_names`.
    ///
    /// An empty list is always satisfied.
    ///
    /// # Errors
    ///
    /// The storage error of the role lookup.
    pub async fn user_has_all_roles(&self, user: &impl AuthorizableUser, role_names: &[&str]) -> AuthzResult<bool> {
        if role_names.is_empty() {
            return Ok(true);
        }
        let roles = self.user_roles(user).await?;
        let held: HashSet<&str> = roles.iter().map(|role| role.name.as_str()).collect();
        Ok(role_names.iter().all(|name| held.contains(name)))
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Run `handler` with the roles of every `RolesCreated` event.
    pub fn on_roles_created<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&[Role]) + Send + Sync + 'static,
    {
        self.bus.on(EventKind::RolesCreated, move |event| {
            if let RbacEvent::RolesCreated { roles } = &event.payload {
                handler(roles);
            }
        })
    }

    /// Run `handler` with the ids of every `RolesDeleted` event.
    pub fn on_roles_deleted<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&[RoleId]) + Send + Sync + 'static,
    {
        self.bus.on(EventKind::RolesDeleted, move |event| {
            if let RbacEvent::RolesDeleted { role_ids } = &event.payload {
                handler(role_ids);
            }
        })
    }

    /// Run `handler` with the permissions of every `PermissionsCreated` event.
    pub fn on_perms_created<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&[Permission]) + Send + Sync + 'static,
    {
        self.bus.on(EventKind::PermissionsCreated, move |event| {
            if let RbacEvent::PermissionsCreated { permissions } = &event.payload {
                handler(permissions);
            }
        })
    }

    /// Run `handler` with the updated role of every `PermissionsAddedToRole` event.
    pub fn on_perms_added_to_role<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Role) + Send + Sync + 'static,
    {
        self.bus.on(EventKind::PermissionsAddedToRole, move |event| {
            if let RbacEvent::PermissionsAddedToRole { role } = &event.payload {
                handler(role);
            }
        })
    }

    /// Run `handler` with the updated role of every `PermissionsRemovedFromRole` event.
    pub fn on_perms_removed_from_role<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Role) + Send + Sync + 'static,
    {
        self.bus.on(EventKind::PermissionsRemovedFromRole, move |event| {
            if let RbacEvent::PermissionsRemovedFromRole { role } = &event.payload {
                handler(role);
            }
        })
    }
}
