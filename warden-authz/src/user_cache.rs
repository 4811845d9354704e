//! Per-user role cache with TTL
//!
//! Maps a user cache key (`"<prefix><primary key>"`) to the user's role
//! list so repeated checks skip the role query. Each entry expires on its
//! own. Nothing here is needed for correctness: a miss falls back to storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use warden_rbac::Role;

use crate::user::AuthorizableUser;

/// Cached entry with TTL
#[derive(Debug, Clone)]
struct CachedEntry {
    roles: Vec<Role>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// User role cache.
///
/// Cheap to clone; clones share entries. A disabled cache never stores
/// anything and always misses.
#[derive(Debug, Clone)]
pub struct UserRoleCache {
    entries: Arc<RwLock<HashMap<String, CachedEntry>>>,
    enabled: bool,
    prefix: String,
}

impl UserRoleCache {
    /// Create a cache. `prefix` is prepended to user primary keys.
    pub fn new(enabled: bool, prefix: impl Into<String>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            enabled,
            prefix: prefix.into(),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(false, "user_")
    }

    /// Whether caching is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cache key for a user, e.g. `user_42`.
    pub fn key_for(&self, user: &impl AuthorizableUser) -> String {
        format!("{}{}", self.prefix, user.primary_key())
    }

    /// Roles cached under `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<Vec<Role>> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.roles.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired - remove and miss
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    /// Store roles under `key` for `ttl`.
    ///
    /// A TTL too large to add to the current time never expires.
    pub fn set(&self, key: impl Into<String>, roles: Vec<Role>, ttl: Duration) {
        if !self.enabled {
            return;
        }
        let entry = CachedEntry {
            roles,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), entry);
    }

    /// Drop one entry.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    /// Drop every entry.
    pub fn flush_all(&self) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
