//! Session lifecycle types and the Connector trait.
//!
//! A Connector opens one game session and hands back the [`World`] handle
//! plus a stream of [`SessionEvent`]s. The session ends with exactly one
//! `Ended` event (or the stream closing).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::world::World;

/// Lifecycle state of the agent's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Stopped,
    Starting,
    Running,
    /// A reconnect is scheduled after an unsolicited end.
    Retrying,
    /// Stopped because nobody is online; restart is suppressed until the
    /// presence cooldown elapses or a player shows up.
    CoolingDown,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Retrying => "retrying",
            SessionState::CoolingDown => "cooling_down",
        };
        f.write_str(s)
    }
}

/// Something the live session reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Logged in, world not loaded yet.
    Login,
    /// In the world and ready for commands.
    Spawned,
    Chat { username: String, message: String },
    /// Any non-chat server message (system text, plugin prompts).
    ServerMessage { text: String },
    PlayerJoined { username: String },
    PlayerLeft { username: String },
    /// A non-agent player moved.
    PlayerMoved { username: String },
    Health { health: f32, food: u32 },
    GoalReached,
    PathReset { reason: String },
    Kicked { reason: String },
    Error { message: String },
    Ended { reason: String },
}

/// Parameters for opening a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
}

/// An open session.
pub struct SessionHandle {
    pub world: Arc<dyn World>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Opens game sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionHandle, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_starting_and_running_are_active() {
        assert!(SessionState::Starting.is_active());
        assert!(SessionState::Running.is_active());
        assert!(!SessionState::Retrying.is_active());
        assert!(!SessionState::CoolingDown.is_active());
        assert!(!SessionState::Stopped.is_active());
    }

    #[test]
    fn session_event_wire_format() {
        let ev: SessionEvent =
            serde_json::from_str(r#"{"event":"chat","username":"alex","message":"!come"}"#)
                .unwrap();
        assert_eq!(
            ev,
            SessionEvent::Chat {
                username: "alex".into(),
                message: "!come".into()
            }
        );
        assert_eq!(SessionState::CoolingDown.to_string(), "cooling_down");
    }
}
