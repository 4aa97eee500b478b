//! StatusSource trait — out-of-session server status queries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// The subset of a server status response the agent cares about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    pub online_players: u32,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Queries a server's public status without joining it.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fails with [`TransportError::Unreachable`] when the server is offline.
    async fn query_status(&self, host: &str, port: u16) -> Result<ServerStatus, TransportError>;
}
