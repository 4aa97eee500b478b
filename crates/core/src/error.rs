//! Error types for the craftbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error type; the top-level
//! [`Error`] wraps them together with the lifecycle outcomes
//! (permission denied, retries exhausted, cancelled).

use thiserror::Error;

/// The top-level error type for all craftbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Status query / session I/O ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- A single world interaction ---
    #[error("Action failed: {0}")]
    Action(#[from] ActionError),

    // --- Text generation ---
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Permission denied: {identity} may not use '{directive}'")]
    PermissionDenied { identity: String, directive: String },

    #[error("Retries exhausted after {attempts} attempts")]
    ExhaustedRetries { attempts: u32 },

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Boundary errors ---

/// Failure talking to the game server, either the status endpoint or the
/// live session.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server refused the connection; it is offline.
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Session closed")]
    SessionClosed,
}

impl TransportError {
    /// Whether this is the expected "server offline" condition.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable(_))
    }

    /// Classify an I/O error, keeping connection-refused distinguishable.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => TransportError::Unreachable(err.to_string()),
            _ => TransportError::Io(err.to_string()),
        }
    }
}

/// A single navigation or interaction attempt failed.
///
/// These are always recovered locally by the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Cancelled")]
    Cancelled,

    #[error("No path: {0}")]
    NoPath(String),

    #[error("Target out of reach")]
    OutOfReach,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{action} failed: {reason}")]
    Failed { action: String, reason: String },

    #[error("Session transport failed: {0}")]
    Transport(String),
}

impl ActionError {
    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        ActionError::Failed {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled)
    }
}

impl From<TransportError> for ActionError {
    fn from(err: TransportError) -> Self {
        ActionError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("Text generation not configured: {0}")]
    NotConfigured(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned no text")]
    EmptyResponse,
}
