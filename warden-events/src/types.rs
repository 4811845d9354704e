//! Event types for role and permission lifecycle changes
//!
//! The set of events is closed: every payload is a variant of [`RbacEvent`]
//! and subscribers register against an [`EventKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_rbac::{Permission, Role, RoleId};

/// Event envelope.
///
/// Every emitted payload is wrapped in this envelope, which adds an id and
/// a timestamp for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Event payload
    pub payload: RbacEvent,
}

impl Event {
    /// Wrap a payload.
    pub fn new(payload: RbacEvent) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// The kind of the payload.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Role and permission lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RbacEvent {
    /// Roles were created (they have no permissions yet)
    RolesCreated { roles: Vec<Role> },
    /// Roles were deleted
    RolesDeleted { role_ids: Vec<RoleId> },
    /// Permissions were created
    PermissionsCreated { permissions: Vec<Permission> },
    /// Permissions were attached to a role; `role` carries its full new list
    PermissionsAddedToRole { role: Role },
    /// Permissions were detached from a role; `role` carries its full new list
    PermissionsRemovedFromRole { role: Role },
}

impl RbacEvent {
    /// The kind used for subscription routing.
    pub fn kind(&self) -> EventKind {
        match self {
            RbacEvent::RolesCreated { .. } => EventKind::RolesCreated,
            RbacEvent::RolesDeleted { .. } => EventKind::RolesDeleted,
            RbacEvent::PermissionsCreated { .. } => EventKind::PermissionsCreated,
            RbacEvent::PermissionsAddedToRole { .. } => EventKind::PermissionsAddedToRole,
            RbacEvent::PermissionsRemovedFromRole { .. } => EventKind::PermissionsRemovedFromRole,
        }
    }

    /// Wrap into an envelope.
    pub fn to_event(self) -> Event {
        Event::new(self)
    }
}

/// Payload-free discriminant of [`RbacEvent`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// See [`RbacEvent::RolesCreated`]
    RolesCreated,
    /// See [`RbacEvent::RolesDeleted`]
    RolesDeleted,
    /// See [`RbacEvent::PermissionsCreated`]
    PermissionsCreated,
    /// See [`RbacEvent::PermissionsAddedToRole`]
    PermissionsAddedToRole,
    /// See [`RbacEvent::PermissionsRemovedFromRole`]
    PermissionsRemovedFromRole,
}

impl EventKind {
    /// Dotted name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RolesCreated => "roles.created",
            EventKind::RolesDeleted => "roles.deleted",
            EventKind::PermissionsCreated => "permissions.created",
            EventKind::PermissionsAddedToRole => "role.permissions_added",
            EventKind::PermissionsRemovedFromRole => "role.permissions_removed",
        }
    }

    /// Every kind.
    pub fn all() -> [EventKind; 5] {
        [
            EventKind::RolesCreated,
            EventKind::RolesDeleted,
            EventKind::PermissionsCreated,
            EventKind::PermissionsAddedToRole,
            EventKind::PermissionsRemovedFromRole,
        ]
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        let event = RbacEvent::RolesDeleted { role_ids: vec![1, 2] }.to_event();
        assert_eq!(event.kind(), EventKind::RolesDeleted);
        assert_eq!(event.kind().to_string(), "roles.deleted");
    }

    #[test]
    fn test_event_serialization() {
        let event = RbacEvent::RolesDeleted { role_ids: vec![4] };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "roles_deleted");
        assert_eq!(json["role_ids"][0], 4);

        let back: RbacEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_envelope_ids_unique() {
        let a = RbacEvent::RolesDeleted { role_ids: vec![] }.to_event();
        let b = RbacEvent::RolesDeleted { role_ids: vec![] }.to_event();
        assert_ne!(a.id, b.id);
    }
}
