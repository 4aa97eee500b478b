//! Behavior loops — long-running autonomous routines.
//!
//! A [`Behavior`] is a resumable state machine: [`drive`] calls `tick` until
//! it completes or is cancelled, sleeping for whatever delay each tick asks
//! for. Ticks never fail; every world error is recovered inside the tick so
//! the loop keeps its schedule.

pub mod drops;
pub mod maintenance;
pub mod mining;
pub mod wood;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use craftbot_config::BehaviorConfig;
use craftbot_core::{DomainEvent, EventBus};
use tokio::task::JoinHandle;
use tracing::info;

use crate::coordinator::{CancelFlag, TaskCoordinator};

pub use drops::DropPickup;
pub use maintenance::{HungerAction, HungerPolicy};
pub use mining::MiningLoop;
pub use wood::WoodCollection;

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Run again after the delay.
    Reschedule(Duration),
    /// The stop condition was reached.
    Completed,
    /// The cancel flag was observed mid-tick.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    Completed,
    Cancelled,
}

impl LoopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopOutcome::Completed => "completed",
            LoopOutcome::Cancelled => "cancelled",
        }
    }
}

/// Everything a tick may touch.
pub struct BehaviorContext {
    pub coordinator: Arc<TaskCoordinator>,
    pub cancel: CancelFlag,
    pub drops: Arc<DropPickup>,
    pub config: BehaviorConfig,
    pub events: Arc<EventBus>,
}

impl BehaviorContext {
    /// Register a new run of `name` with the coordinator. Any earlier run
    /// of the same loop is cancelled.
    pub fn begin(
        name: &'static str,
        coordinator: Arc<TaskCoordinator>,
        drops: Arc<DropPickup>,
        config: BehaviorConfig,
        events: Arc<EventBus>,
    ) -> Self {
        let cancel = coordinator.begin_loop(name);
        Self {
            coordinator,
            cancel,
            drops,
            config,
            events,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_ms)
    }
}

#[async_trait]
pub trait Behavior: Send {
    fn name(&self) -> &'static str;

    async fn tick(&mut self, ctx: &BehaviorContext) -> TickOutcome;
}

/// Run `behavior` until it finishes. The cancel flag is checked before
/// every tick.
pub async fn drive<B: Behavior + ?Sized>(behavior: &mut B, ctx: &BehaviorContext) -> LoopOutcome {
    let name = behavior.name();
    info!(behavior = name, "Behavior loop started");

    let outcome = loop {
        if ctx.cancel.is_cancelled() {
            break LoopOutcome::Cancelled;
        }
        match behavior.tick(ctx).await {
            TickOutcome::Reschedule(delay) => tokio::time::sleep(delay).await,
            TickOutcome::Completed => break LoopOutcome::Completed,
            TickOutcome::Cancelled => break LoopOutcome::Cancelled,
        }
    };

    ctx.coordinator.end_loop(name, &ctx.cancel);
    info!(behavior = name, outcome = outcome.as_str(), "Behavior loop finished");
    ctx.events.publish(DomainEvent::BehaviorFinished {
        behavior: name.into(),
        outcome: outcome.as_str().into(),
        timestamp: Utc::now(),
    });
    outcome
}

/// Drive `behavior` on its own task.
pub fn spawn<B: Behavior + 'static>(mut behavior: B, ctx: BehaviorContext) -> JoinHandle<LoopOutcome> {
    tokio::spawn(async move { drive(&mut behavior, &ctx).await })
}
