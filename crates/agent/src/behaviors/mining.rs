//! Ore mining around the agent's position.

use std::collections::HashSet;

use async_trait::async_trait;
use craftbot_core::{Block, BlockPos, BlockQuery, EquipSlot};
use tracing::{debug, info, warn};

use super::{Behavior, BehaviorContext, TickOutcome};
use crate::actions;
use crate::classify::ORE_BLOCKS;

/// Empty scans in a row before the loop gives up.
const MAX_EMPTY_SCANS: u32 = 5;

pub struct MiningLoop {
    empty_scans: u32,
    visited: HashSet<BlockPos>,
}

impl MiningLoop {
    pub const NAME: &'static str = "mining";

    pub fn new() -> Self {
        Self {
            empty_scans: 0,
            visited: HashSet::new(),
        }
    }

    /// The first unvisited, diggable ore among `candidates`.
    async fn pick_target(
        &self,
        ctx: &BehaviorContext,
        candidates: Vec<BlockPos>,
    ) -> Option<Block> {
        let world = ctx.coordinator.world();
        for pos in candidates {
            if self.visited.contains(&pos) {
                continue;
            }
            if let Ok(Some(block)) = world.block_at(pos).await {
                if world.can_dig(&block).await.unwrap_or(false) {
                    return Some(block);
                }
            }
        }
        None
    }
}

impl Default for MiningLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Behavior for MiningLoop {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn tick(&mut self, ctx: &BehaviorContext) -> TickOutcome {
        if ctx.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        let world = ctx.coordinator.world();

        ctx.drops.collect(&ctx.coordinator).await;

        let query = BlockQuery {
            names: ORE_BLOCKS.iter().map(|s| s.to_string()).collect(),
            max_distance: ctx.config.mining_radius,
            count: ctx.config.scan_count,
        };
        let candidates = world.find_blocks(&query).await.unwrap_or_else(|e| {
            warn!(error = %e, "Ore scan failed");
            Vec::new()
        });

        let Some(block) = self.pick_target(ctx, candidates).await else {
            self.empty_scans += 1;
            if self.empty_scans >= MAX_EMPTY_SCANS {
                info!(scans = self.empty_scans, "No ore left nearby");
                if let Err(e) = world.chat("⛏️ No more ores nearby, stopping.").await {
                    warn!(error = %e, "Failed to announce mining stop");
                }
                return TickOutcome::Completed;
            }
            debug!(scans = self.empty_scans, "No ore in range, roaming");
            actions::roam(&ctx.coordinator, 10.0).await;
            return TickOutcome::Reschedule(ctx.tick_interval());
        };
        self.empty_scans = 0;

        if ctx.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        self.visited.insert(block.pos);
        match world.best_harvest_tool(&block).await {
            Ok(Some(tool)) => {
                if let Err(e) = world.equip(&tool, EquipSlot::Hand).await {
                    debug!(error = %e, "Could not equip harvest tool");
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "No harvest tool lookup"),
        }
        if let Err(e) = actions::mine_block(&ctx.coordinator, block.pos).await {
            debug!(pos = %block.pos, error = %e, "Ore not mined");
        }

        if ctx.cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        TickOutcome::Reschedule(ctx.tick_interval())
    }
}
