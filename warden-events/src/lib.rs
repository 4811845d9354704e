//! # Warden Events
//!
//! This crate provides the in-process event bus that keeps Warden's role and
//! permission caches consistent with storage writes.
//!
//! ## Overview
//!
//! The warden-events crate handles:
//! - **Event Types**: A closed set of role/permission lifecycle events
//! - **Event Bus**: Synchronous publish/subscribe keyed by [`EventKind`]
//! - **Event Handlers**: Optional async processing, fire-and-forget
//!
//! ## Event Types
//!
//! - `RolesCreated`: new roles, which start with no permissions
//! - `RolesDeleted`: ids of removed roles
//! - `PermissionsCreated`: new permission records
//! - `PermissionsAddedToRole` / `PermissionsRemovedFromRole`: the affected role
//!   with its complete, current permission list
//!
//! ## Usage
//!
//! ```rust
//! use warden_events::{EventBus, EventKind, RbacEvent};
//!
//! let bus = EventBus::new();
//!
//! let sub = bus.on(EventKind::RolesDeleted, |event| {
//!     if let RbacEvent::RolesDeleted { role_ids } = &event.payload {
//!         println!("deleted {:?}", role_ids);
//!     }
//! });
//!
//! bus.emit(RbacEvent::RolesDeleted { role_ids: vec![3] });
//! sub.unsubscribe();
//! ```
//!
//! ## Delivery
//!
//! - Handlers run synchronously inside `emit`, in subscription order
//! - `once` handlers are removed before they run
//! - Unsubscribing is idempotent
//! - Async handlers are spawned and their errors are only logged

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, EventHandler, HandlerFn, Subscription};
pub use types::{Event, EventKind, RbacEvent};
