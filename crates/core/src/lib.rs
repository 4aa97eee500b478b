//! # craftbot core
//!
//! Domain types, collaborator traits, and error definitions for the craftbot
//! game agent. This crate has **no I/O of its own** — it defines the model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the live game session
//! ([`World`] opened by a [`Connector`]), the server status endpoint
//! ([`StatusSource`]) and the text generator ([`TextGenerator`]).
//! Implementations live in `craftbot-connectors` and `craftbot-providers`;
//! the agent logic only sees the traits, so tests substitute scripted mocks.

pub mod error;
pub mod event;
pub mod generator;
pub mod goal;
pub mod session;
pub mod status;
pub mod world;

// Re-export key types at crate root for ergonomics
pub use error::{ActionError, Error, GeneratorError, Result, TransportError};
pub use event::{DomainEvent, EventBus};
pub use generator::TextGenerator;
pub use goal::Goal;
pub use session::{ConnectOptions, Connector, SessionEvent, SessionHandle, SessionState};
pub use status::{ServerStatus, StatusSource};
pub use world::{
    Block, BlockPos, BlockQuery, Entity, EntityKind, EquipSlot, Face, Item, PlayerInfo, RayHit,
    Vec3, World, WorldResult,
};
