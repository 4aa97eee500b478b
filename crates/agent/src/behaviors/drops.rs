//! Ground item pickup shared by the gathering loops.

use std::sync::Mutex;
use std::time::Duration;

use craftbot_config::BehaviorConfig;
use craftbot_core::{EntityKind, Goal};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::coordinator::TaskCoordinator;

/// Picks up dropped items near the agent, at most once per cooldown.
pub struct DropPickup {
    radius: f64,
    cooldown: Duration,
    last_pickup: Mutex<Option<Instant>>,
}

impl DropPickup {
    pub fn new(radius: f64, cooldown: Duration) -> Self {
        Self {
            radius,
            cooldown,
            last_pickup: Mutex::new(None),
        }
    }

    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self::new(
            config.pickup_radius,
            Duration::from_millis(config.pickup_cooldown_ms),
        )
    }

    fn last(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.last_pickup.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One pickup pass. Returns how many items were collected.
    ///
    /// Items are visited in discovery order. A failed pickup is logged and
    /// the pass moves on; a cancelled navigation ends the pass.
    pub async fn collect(&self, coordinator: &TaskCoordinator) -> usize {
        let started = Instant::now();
        if let Some(last) = *self.last() {
            if started.duration_since(last) < self.cooldown {
                return 0;
            }
        }

        let world = coordinator.world();
        let (pos, entities) = match (world.position().await, world.entities().await) {
            (Ok(pos), Ok(entities)) => (pos, entities),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Cannot scan for drops");
                return 0;
            }
        };

        let drops = entities
            .into_iter()
            .filter(|e| e.kind == EntityKind::Item && e.position.distance_to(&pos) < self.radius);

        let mut collected = 0;
        for drop in drops {
            let result = match coordinator.navigate(Goal::near(drop.position, 1.0)).await {
                Ok(()) => world.pick_up(&drop).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    collected += 1;
                    *self.last() = Some(started);
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => debug!(entity = drop.id, error = %e, "Pickup failed"),
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockWorld, item_entity};
    use craftbot_core::Vec3;
    use std::sync::Arc;

    fn setup() -> (Arc<MockWorld>, TaskCoordinator, DropPickup) {
        let world = Arc::new(MockWorld::new("Aisha"));
        let coordinator = TaskCoordinator::new(world.clone());
        (world, coordinator, DropPickup::new(5.0, Duration::from_millis(500)))
    }

    #[tokio::test(start_paused = true)]
    async fn collects_only_items_in_radius() {
        let (world, coordinator, drops) = setup();
        world.add_entity(item_entity(1, Vec3::new(2.0, 64.0, 0.0)));
        world.add_entity(item_entity(2, Vec3::new(20.0, 64.0, 0.0)));
        world.add_visible_player("alex", 3, Vec3::new(1.0, 64.0, 1.0));

        assert_eq!(drops.collect(&coordinator).await, 1);
        assert_eq!(world.calls_with_prefix("pick_up"), vec!["pick_up:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_suppresses_back_to_back_passes() {
        let (world, coordinator, drops) = setup();
        world.add_entity(item_entity(1, Vec3::new(2.0, 64.0, 0.0)));
        assert_eq!(drops.collect(&coordinator).await, 1);

        world.add_entity(item_entity(2, Vec3::new(1.0, 64.0, 0.0)));
        assert_eq!(drops.collect(&coordinator).await, 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(drops.collect(&coordinator).await, 1);
    }
}
