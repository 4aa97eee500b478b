//! The craftbot agent — presence-driven session lifecycle and behaviors.
//!
//! Control flows top-down:
//!
//! 1. **Presence Monitor** turns status pings and membership polls into
//!    readings against one shared retry counter
//! 2. **Connection Supervisor** starts, stops and reconnects the session
//! 3. **Controller** routes session events: chat to the **Dispatcher**,
//!    health to the hunger policy, server prompts to auto-auth
//! 4. **Task Coordinator** owns the single navigation goal and the
//!    cancellation flags of the running **Behavior Loops**
//!
//! Nothing here performs I/O directly: the game session, status endpoint
//! and text generator are the `craftbot_core` traits.

pub mod actions;
pub mod behaviors;
pub mod chat;
pub mod classify;
pub mod controller;
pub mod coordinator;
pub mod dispatcher;
pub mod gear;
pub mod presence;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use behaviors::{Behavior, BehaviorContext, LoopOutcome, TickOutcome};
pub use chat::ChatRelay;
pub use controller::{ActivityClock, Controller, SessionContext};
pub use coordinator::{CancelFlag, GoalMode, TaskCoordinator};
pub use dispatcher::{DispatchOutcome, Directive, Dispatcher, GotoTarget};
pub use presence::{PresenceDecision, PresenceMonitor, PresenceReading, PresenceSource, RetryCounter};
pub use supervisor::{ConnectionSupervisor, ping_and_decide, spawn_ping_loop};
