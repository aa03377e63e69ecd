//! SyncSphere domain-event infrastructure.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DomainEvent`] -- the canonical event envelope (lock acquired/released/
//!   expired, project saved).
//! - [`EventPersistence`] -- background service that durably writes every
//!   event to the `events` table, keeping the ownership manager decoupled
//!   from audit capture.

pub mod bus;
pub mod persistence;

pub use bus::{DomainEvent, EventBus};
pub use persistence::EventPersistence;
