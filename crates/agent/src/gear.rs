//! Armor and weapon upkeep.

use craftbot_core::World;
use tracing::{debug, warn};

use crate::classify;

/// Equip the best armor piece per slot and the best sword.
///
/// Returns how many items were equipped. Failures on one piece do not stop
/// the others.
pub async fn equip_best_gear(world: &dyn World) -> usize {
    let items = match world.inventory().await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Cannot read inventory for gear");
            return 0;
        }
    };

    let mut equipped = 0;
    for (item, slot) in classify::best_gear(&items) {
        match world.equip(&item, slot).await {
            Ok(()) => {
                debug!(item = %item.name, ?slot, "Equipped");
                equipped += 1;
            }
            Err(e) => warn!(item = %item.name, error = %e, "Failed to equip"),
        }
    }
    equipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockWorld;

    #[tokio::test]
    async fn equips_one_piece_per_slot() {
        let world = MockWorld::new("Aisha");
        world.give("leather_boots", 1);
        world.give("diamond_boots", 1);
        world.give("iron_sword", 1);
        world.give("oak_log", 10);

        assert_eq!(equip_best_gear(&world).await, 2);
        let calls = world.calls_with_prefix("equip");
        assert!(calls.contains(&"equip:diamond_boots:Feet".to_string()));
        assert!(calls.contains(&"equip:iron_sword:Hand".to_string()));
    }
}
