//! Wood collection: chop logs until the inventory holds the target count.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use craftbot_core::{BlockPos, BlockQuery, Goal};
use tracing::{debug, info, warn};

use super::{Behavior, BehaviorContext, TickOutcome};
use crate::actions;
use crate::classify::{self, LOG_BLOCKS};

pub struct WoodCollection {
    target: u32,
    max_skip: u32,
    /// Positions attempted during this run. Never shrinks.
    mined: HashSet<BlockPos>,
}

impl WoodCollection {
    pub const NAME: &'static str = "wood";

    pub fn new(target: u32, max_skip: u32) -> Self {
        Self {
            target,
            max_skip,
            mined: HashSet::new(),
        }
    }

    pub fn mined(&self) -> &HashSet<BlockPos> {
        &self.mined
    }

    async fn is_eligible(ctx: &BehaviorContext, pos: BlockPos) -> bool {
        let world = ctx.coordinator.world();
        match world.block_at(pos).await {
            Ok(Some(block)) if !classify::is_leaves(&block.name) => {
                world.can_dig(&block).await.unwrap_or(false)
            }
            Ok(_) => false,
            Err(e) => {
                debug!(%pos, error = %e, "Cannot inspect candidate");
                false
            }
        }
    }
}

#[async_trait]
impl Behavior for WoodCollection {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn tick(&mut self, ctx: &BehaviorContext) -> TickOutcome {
        if ctx.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        let world = ctx.coordinator.world();

        match world.inventory().await {
            Ok(items) => {
                let logs = classify::log_count(&items);
                if logs >= self.target {
                    info!(logs, target = self.target, "Wood quota reached");
                    if let Err(e) = world.chat(&format!("✅ Collected {logs} logs.")).await {
                        warn!(error = %e, "Failed to announce wood quota");
                    }
                    return TickOutcome::Completed;
                }
            }
            Err(e) => warn!(error = %e, "Cannot read inventory"),
        }

        ctx.drops.collect(&ctx.coordinator).await;
        if ctx.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        let query = BlockQuery {
            names: LOG_BLOCKS.iter().map(|s| s.to_string()).collect(),
            max_distance: ctx.config.scan_radius,
            count: ctx.config.scan_count,
        };
        let candidates = world.find_blocks(&query).await.unwrap_or_else(|e| {
            warn!(error = %e, "Log scan failed");
            Vec::new()
        });

        if candidates.is_empty() {
            debug!("No logs in range, roaming");
            actions::roam(&ctx.coordinator, 15.0).await;
            return TickOutcome::Reschedule(Duration::from_millis(ctx.config.idle_retry_ms));
        }

        let mut skips = 0;
        for pos in candidates {
            if self.mined.contains(&pos) {
                continue;
            }

            if !Self::is_eligible(ctx, pos).await {
                skips += 1;
                if skips >= self.max_skip {
                    debug!(skips, "Too many unusable logs, roaming");
                    actions::roam(&ctx.coordinator, 10.0).await;
                    break;
                }
                continue;
            }

            if ctx.cancel.is_cancelled() {
                return TickOutcome::Cancelled;
            }

            self.mined.insert(pos);
            let result = match ctx.coordinator.navigate(Goal::near_block(pos, 1.0)).await {
                Ok(()) => actions::mine_block(&ctx.coordinator, pos).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                debug!(%pos, error = %e, "Log not mined");
            }
            break;
        }

        if ctx.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        TickOutcome::Reschedule(ctx.tick_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::{DropPickup, LoopOutcome, drive};
    use crate::coordinator::TaskCoordinator;
    use crate::test_support::{GotoMode, MockWorld};
    use craftbot_config::BehaviorConfig;
    use craftbot_core::EventBus;
    use std::sync::Arc;

    fn setup() -> (Arc<MockWorld>, BehaviorContext) {
        let world = Arc::new(MockWorld::new("Aisha"));
        let coordinator = Arc::new(TaskCoordinator::new(world.clone()));
        let config = BehaviorConfig::default();
        let ctx = BehaviorContext::begin(
            WoodCollection::NAME,
            coordinator,
            Arc::new(DropPickup::from_config(&config)),
            config,
            Arc::new(EventBus::default()),
        );
        (world, ctx)
    }

    fn world_mutations(world: &MockWorld) -> Vec<String> {
        world
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("goto") || c.starts_with("dig") || c.starts_with("set_goal"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn quota_met_finishes_on_first_tick() {
        let (world, ctx) = setup();
        world.give("oak_log", 40);
        world.give("spruce_log", 30);
        world.add_scan_result("oak_log", BlockPos::new(4, 64, 4));
        world.set_block("oak_log", BlockPos::new(4, 64, 4));

        let outcome = drive(&mut WoodCollection::new(64, 10), &ctx).await;
        assert_eq!(outcome, LoopOutcome::Completed);
        assert_eq!(world.chats(), vec!["✅ Collected 70 logs."]);
        assert!(world_mutations(&world).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_valve_roams_before_reaching_good_candidate() {
        let (world, ctx) = setup();
        for i in 0..10 {
            let pos = BlockPos::new(i, 64, 0);
            world.add_scan_result("oak_log", pos);
            if i % 2 == 0 {
                world.set_block("oak_leaves", pos);
            } else {
                world.set_block("oak_log", pos);
                world.set_undiggable(pos);
            }
        }
        let good = BlockPos::new(20, 64, 0);
        world.add_scan_result("oak_log", good);
        world.set_block("oak_log", good);

        let mut wood = WoodCollection::new(64, 10);
        let outcome = wood.tick(&ctx).await;

        assert_eq!(outcome, TickOutcome::Reschedule(Duration::from_millis(500)));
        assert!(wood.mined().is_empty());
        assert!(world.calls_with_prefix("dig").is_empty());
        // The only navigation is the roam.
        assert_eq!(world.calls_with_prefix("goto"), vec!["goto:near"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_is_not_retried_in_the_same_run() {
        let (world, ctx) = setup();
        let pos = BlockPos::new(3, 64, 3);
        world.add_scan_result("oak_log", pos);
        world.set_block("oak_log", pos);
        world.set_goto_mode(GotoMode::Fail);

        let mut wood = WoodCollection::new(64, 10);
        wood.tick(&ctx).await;
        assert!(wood.mined().contains(&pos));
        assert_eq!(world.calls_with_prefix("goto").len(), 1);

        world.clear_calls();
        wood.tick(&ctx).await;
        // The failed position is skipped silently; nothing else to mine.
        assert!(world.calls_with_prefix("goto").is_empty());
        assert!(world.calls_with_prefix("dig").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mines_one_block_per_tick() {
        let (world, ctx) = setup();
        let first = BlockPos::new(3, 64, 3);
        let second = BlockPos::new(5, 64, 3);
        for pos in [first, second] {
            world.add_scan_result("oak_log", pos);
            world.set_block("oak_log", pos);
        }

        let mut wood = WoodCollection::new(64, 10);
        wood.tick(&ctx).await;
        assert_eq!(world.calls_with_prefix("dig"), vec![format!("dig:{first}")]);

        wood.tick(&ctx).await;
        assert_eq!(
            world.calls_with_prefix("dig"),
            vec![format!("dig:{first}"), format!("dig:{second}")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_targets_roams_and_waits_longer() {
        let (world, ctx) = setup();
        let outcome = WoodCollection::new(64, 10).tick(&ctx).await;
        assert_eq!(outcome, TickOutcome::Reschedule(Duration::from_millis(1000)));
        assert_eq!(world.calls_with_prefix("goto"), vec!["goto:near"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_loop_makes_no_world_calls() {
        let (world, ctx) = setup();
        let pos = BlockPos::new(3, 64, 3);
        world.add_scan_result("oak_log", pos);
        world.set_block("oak_log", pos);

        ctx.coordinator.stop_all().await;
        world.clear_calls();

        let outcome = drive(&mut WoodCollection::new(64, 10), &ctx).await;
        assert_eq!(outcome, LoopOutcome::Cancelled);
        assert!(world.calls().is_empty());
        assert!(world.chats().is_empty());
    }
}
