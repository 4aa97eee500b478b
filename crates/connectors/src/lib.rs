//! Connectors — the I/O edges of craftbot.
//!
//! - **Bridge**: a live game session driven over newline-delimited JSON
//! - **Status ping**: the server-list ping used for presence checks
//! - **Console**: operator commands read from stdin

pub mod bridge;
pub mod console;
pub mod status_ping;

pub use bridge::{BridgeConnector, BridgeWorld};
pub use console::{ConsoleCommand, ConsoleInput};
pub use status_ping::SlpStatusSource;
