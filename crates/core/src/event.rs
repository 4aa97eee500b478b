//! Domain event system — decoupled observation of the agent's decisions.
//!
//! Events are published when the session changes state, a presence reading
//! is evaluated, a directive is handled or a behavior loop finishes.
//! Subscribers (logging, tests) react without coupling to the publishers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::session::SessionState;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The connection lifecycle moved between states
    SessionStateChanged {
        from: SessionState,
        to: SessionState,
        timestamp: DateTime<Utc>,
    },

    /// A presence reading was evaluated
    PresenceObserved {
        source: String, // "ping", "membership"
        online_players: u32,
        retry_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A chat directive was dispatched
    DirectiveHandled {
        username: String,
        directive: String,
        accepted: bool,
        timestamp: DateTime<Utc>,
    },

    /// A behavior loop reached a terminal state
    BehaviorFinished {
        behavior: String,
        outcome: String, // "completed", "cancelled"
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
