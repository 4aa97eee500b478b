//! Task Coordinator — owner of the single navigation goal.
//!
//! Every command handler and behavior loop goes through here instead of
//! talking to the pathfinder directly. Setting a goal bumps a generation
//! number; any [`TaskCoordinator::navigate`] still waiting on an older
//! generation resolves with [`ActionError::Cancelled`].
//!
//! The coordinator also keeps the cancellation flag of each running
//! behavior loop so `!stop` can reach all of them at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use craftbot_core::{ActionError, Goal, World, WorldResult};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

/// How a goal is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalMode {
    /// Runs once to completion or cancellation.
    Exclusive,
    /// Tracks a moving target; the pathfinder re-evaluates it every tick.
    Persistent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveGoal {
    pub goal: Goal,
    pub mode: GoalMode,
}

/// Cooperative cancellation flag of one behavior loop run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn same_as(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

pub struct TaskCoordinator {
    world: Arc<dyn World>,
    /// Held across the pathfinder call so the world sees goals in the
    /// same order as the coordinator.
    active: Mutex<Option<ActiveGoal>>,
    generation: watch::Sender<u64>,
    loops: std::sync::Mutex<Vec<(&'static str, CancelFlag)>>,
}

impl TaskCoordinator {
    pub fn new(world: Arc<dyn World>) -> Self {
        Self {
            world,
            active: Mutex::new(None),
            generation: watch::channel(0).0,
            loops: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    /// Replace the active goal. The previous goal, and any navigation
    /// awaiting it, is cancelled.
    pub async fn set_goal(&self, goal: Goal, mode: GoalMode) {
        let mut active = self.active.lock().await;
        self.bump();
        debug!(goal = goal.label(), ?mode, "Setting goal");
        if let Err(e) = self
            .world
            .set_goal(Some(&goal), mode == GoalMode::Persistent)
            .await
        {
            warn!(error = %e, goal = goal.label(), "Pathfinder rejected goal");
        }
        *active = Some(ActiveGoal { goal, mode });
    }

    pub async fn cancel_goal(&self) {
        let mut active = self.active.lock().await;
        self.bump();
        if let Err(e) = self.world.set_goal(None, false).await {
            warn!(error = %e, "Failed to clear pathfinder goal");
        }
        *active = None;
    }

    pub async fn current_goal(&self) -> Option<ActiveGoal> {
        self.active.lock().await.clone()
    }

    /// Make `goal` the active exclusive goal and wait until it is reached.
    ///
    /// Fails fast with `Cancelled` as soon as another goal is set or the
    /// goal is cancelled.
    pub async fn navigate(&self, goal: Goal) -> WorldResult<()> {
        let (mine, mut changed) = {
            let mut active = self.active.lock().await;
            self.bump();
            *active = Some(ActiveGoal {
                goal: goal.clone(),
                mode: GoalMode::Exclusive,
            });
            (*self.generation.borrow(), self.generation.subscribe())
        };

        let result = tokio::select! {
            result = self.world.goto(&goal) => result,
            _ = changed.changed() => Err(ActionError::Cancelled),
        };

        let mut active = self.active.lock().await;
        if *self.generation.borrow() == mine {
            *active = None;
        }

        result
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    // ── Behavior loop flags ──

    fn loops(&self) -> std::sync::MutexGuard<'_, Vec<(&'static str, CancelFlag)>> {
        self.loops.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a fresh run of loop `name`, cancelling any earlier run.
    pub fn begin_loop(&self, name: &'static str) -> CancelFlag {
        let flag = CancelFlag::new();
        let mut loops = self.loops();
        loops.retain(|(n, f)| {
            if *n == name {
                f.cancel();
                false
            } else {
                true
            }
        });
        loops.push((name, flag.clone()));
        flag
    }

    /// Forget a finished run. A newer run with the same name is left alone.
    pub fn end_loop(&self, name: &'static str, flag: &CancelFlag) {
        self.loops()
            .retain(|(n, f)| !(*n == name && f.same_as(flag)));
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.loops().iter().any(|(n, _)| *n == name)
    }

    pub fn running_loops(&self) -> Vec<&'static str> {
        self.loops().iter().map(|(n, _)| *n).collect()
    }

    /// Cancel one loop by name. Returns whether it was running.
    pub fn cancel_loop(&self, name: &str) -> bool {
        let mut found = false;
        self.loops().retain(|(n, f)| {
            if *n == name {
                f.cancel();
                found = true;
                false
            } else {
                true
            }
        });
        found
    }

    /// Raise every loop flag without touching the pathfinder.
    pub fn cancel_all_loops(&self) {
        for (_, flag) in self.loops().drain(..) {
            flag.cancel();
        }
    }

    /// The `!stop` path: every loop flag raised and the goal cleared.
    pub async fn stop_all(&self) {
        self.cancel_all_loops();
        self.cancel_goal().await;
    }
}
