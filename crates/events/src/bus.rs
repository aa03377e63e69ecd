//! The in-process domain-event bus.
//!
//! Publishing is fire-and-forget: the ownership manager and snapshot path
//! record what happened and move on, while subscribers (audit persistence
//! today, anything else tomorrow) react on their own tasks. Backed by
//! `tokio::sync::broadcast`, shared as `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use syncsphere_core::types::DbId;
use tokio::sync::broadcast;

/// Buffer capacity of the broadcast channel. A subscriber that falls more
/// than this many events behind observes `RecvError::Lagged` and loses the
/// overwritten ones.
const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Fan-out hub for [`DomainEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// With zero subscribers the event evaporates; publishing never fails
    /// and never blocks the publisher.
    pub fn publish(&self, event: DomainEvent) {
        // A SendError only means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    /// Open an independent subscription covering all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// An immutable record of something that happened: a lock was acquired,
/// released, or expired, or a project snapshot was saved.
///
/// Built with [`DomainEvent::new`] plus the `with_*` methods. Every event in
/// this system concerns at most one project and one acting user, so those
/// ride as plain optional fields rather than a generic source-entity pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Dot-separated event name, e.g. `"lock.acquired"` or `"project.saved"`.
    pub event_type: String,

    /// The project the event concerns, if any.
    pub project_id: Option<DbId>,

    /// The user whose action produced the event, if any.
    pub actor_user_id: Option<DbId>,

    /// Event-specific data, e.g. the box id of a lock event.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    /// A bare event carrying only its type; everything else defaults.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            project_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: DbId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
