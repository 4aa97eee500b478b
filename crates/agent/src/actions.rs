//! One-shot world interactions built on the coordinator.
//!
//! Each helper re-reads the world state it needs; nothing is cached across
//! awaits.

use craftbot_core::{
    ActionError, BlockPos, BlockQuery, Entity, EquipSlot, Goal, RayHit, Vec3, World, WorldResult,
};
use rand::Rng;
use tracing::{debug, warn};

use crate::classify;
use crate::coordinator::TaskCoordinator;

/// How far a player can point at a block for `!break` and `!place`.
pub const SIGHT_RANGE: f64 = 120.0;
const INTERACT_RANGE: f64 = 4.0;
const TRAPPED_CHEST_RADIUS: u32 = 16;
const CHEST_RADIUS: u32 = 10;

/// Walk to a random point within `radius` blocks. Failures are logged.
pub async fn roam(coordinator: &TaskCoordinator, radius: f64) {
    let pos = match coordinator.world().position().await {
        Ok(pos) => pos,
        Err(e) => {
            warn!(error = %e, "Cannot roam without a position");
            return;
        }
    };

    let (dx, dz) = {
        let mut rng = rand::rng();
        (
            rng.random_range(-radius..=radius),
            rng.random_range(-radius..=radius),
        )
    };
    let target = pos.offset(dx, 0.0, dz);
    debug!(%target, "Roaming");

    if let Err(e) = coordinator.navigate(Goal::near(target, 1.0)).await {
        debug!(error = %e, "Roam interrupted");
    }
}

/// Walk onto the block above `pos` and dig it.
pub async fn mine_block(coordinator: &TaskCoordinator, pos: BlockPos) -> WorldResult<()> {
    let world = coordinator.world();
    let block = world
        .block_at(pos)
        .await?
        .ok_or_else(|| ActionError::NotFound(format!("block at {pos}")))?;
    if !world.can_dig(&block).await? {
        return Err(ActionError::OutOfReach);
    }

    coordinator.navigate(Goal::Block { pos: pos.up() }).await?;
    world.dig(&block).await?;
    debug!(block = %block.name, %pos, "Mined block");
    Ok(())
}

/// The visible entity of `username`, if they are in view.
pub async fn requester_entity(world: &dyn World, username: &str) -> WorldResult<Option<Entity>> {
    Ok(world
        .players()
        .await?
        .into_iter()
        .find(|p| p.username == username)
        .and_then(|p| p.entity))
}

/// The block `entity` is looking at.
pub async fn sight_block(world: &dyn World, entity: &Entity) -> WorldResult<Option<RayHit>> {
    world
        .raycast(entity.eye_position(), entity.look_direction(), SIGHT_RANGE)
        .await
}

/// Dig the block `viewer` is looking at.
pub async fn break_in_sight(coordinator: &TaskCoordinator, viewer: &Entity) -> WorldResult<()> {
    let world = coordinator.world();
    let hit = sight_block(world.as_ref(), viewer)
        .await?
        .ok_or(ActionError::OutOfReach)?;

    coordinator
        .navigate(Goal::LookAtBlock {
            pos: hit.block.pos,
            range: INTERACT_RANGE,
        })
        .await?;

    if let Some(tool) = world.best_harvest_tool(&hit.block).await? {
        world.equip(&tool, EquipSlot::Hand).await?;
    }
    world.dig(&hit.block).await
}

/// Place `item_name` against the face `viewer` is looking at.
pub async fn place_in_sight(
    coordinator: &TaskCoordinator,
    viewer: &Entity,
    item_name: &str,
) -> WorldResult<()> {
    let world = coordinator.world();
    let item = world
        .inventory()
        .await?
        .into_iter()
        .find(|i| i.name.contains(item_name))
        .ok_or_else(|| ActionError::NotFound(item_name.to_string()))?;

    let hit = sight_block(world.as_ref(), viewer)
        .await?
        .ok_or(ActionError::OutOfReach)?;
    let normal = hit.face.normal();
    let target = hit.block.pos.offset(normal.x, normal.y, normal.z);

    coordinator
        .navigate(Goal::PlaceBlock {
            pos: target,
            range: INTERACT_RANGE,
        })
        .await?;

    world.equip(&item, EquipSlot::Hand).await?;
    world
        .look_at(hit.block.pos.center().plus(normal.as_vec3().scaled(0.5)))
        .await?;
    world.place_block(&hit.block, hit.face).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverOutcome {
    NoChest,
    Empty,
    /// Number of stacks transferred.
    Delivered(usize),
}

async fn nearest(world: &dyn World, name: &str, radius: u32) -> WorldResult<Option<BlockPos>> {
    let query = BlockQuery {
        names: vec![name.to_string()],
        max_distance: radius,
        count: 1,
    };
    Ok(world.find_blocks(&query).await?.into_iter().next())
}

/// Move every inventory stack into the nearest trapped chest.
pub async fn deliver_to_trapped_chest(coordinator: &TaskCoordinator) -> WorldResult<DeliverOutcome> {
    let world = coordinator.world();
    let Some(chest) = nearest(world.as_ref(), "trapped_chest", TRAPPED_CHEST_RADIUS).await? else {
        return Ok(DeliverOutcome::NoChest);
    };

    let items = world.inventory().await?;
    if items.is_empty() {
        return Ok(DeliverOutcome::Empty);
    }

    coordinator.navigate(Goal::near_block(chest, 1.0)).await?;

    let mut delivered = 0;
    for item in &items {
        match world.deposit(chest, item).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(item = %item.name, error = %e, "Failed to deliver item"),
        }
    }
    Ok(DeliverOutcome::Delivered(delivered))
}

/// Deposit every log stack into the nearest chest.
///
/// Returns `None` when no chest is close enough, otherwise the number of
/// logs moved.
pub async fn deposit_logs(coordinator: &TaskCoordinator) -> WorldResult<Option<u32>> {
    let world = coordinator.world();
    let Some(chest) = nearest(world.as_ref(), "chest", CHEST_RADIUS).await? else {
        return Ok(None);
    };

    coordinator.navigate(Goal::near_block(chest, 1.0)).await?;

    let mut moved = 0;
    for item in world.inventory().await? {
        if !item.name.contains("log") {
            continue;
        }
        world.deposit(chest, &item).await?;
        moved += item.count;
    }
    Ok(Some(moved))
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerLocation {
    Offline,
    OutOfView,
    At { pos: Vec3, dimension: String },
}

pub async fn locate_player(world: &dyn World, username: &str) -> WorldResult<PlayerLocation> {
    let Some(player) = world
        .players()
        .await?
        .into_iter()
        .find(|p| p.username == username)
    else {
        return Ok(PlayerLocation::Offline);
    };

    match player.entity {
        Some(entity) => Ok(PlayerLocation::At {
            pos: entity.position,
            dimension: world.dimension().await?,
        }),
        None => Ok(PlayerLocation::OutOfView),
    }
}

/// Stand where `entity` stands and look where it looks.
pub async fn copy_position(coordinator: &TaskCoordinator, entity: &Entity) -> WorldResult<()> {
    coordinator
        .navigate(Goal::near(entity.position, 0.5))
        .await?;
    let facing = entity.eye_position().plus(entity.look_direction().scaled(5.0));
    coordinator.world().look_at(facing).await
}

/// Equip the best axe in the inventory, if any.
pub async fn equip_axe(world: &dyn World) -> WorldResult<Option<String>> {
    let items = world.inventory().await?;
    let Some(axe) = classify::best_axe(&items) else {
        return Ok(None);
    };
    world.equip(axe, EquipSlot::Hand).await?;
    Ok(Some(axe.name.clone()))
}

pub async fn equip_pickaxe(world: &dyn World) -> WorldResult<Option<String>> {
    let items = world.inventory().await?;
    let Some(pick) = classify::best_pickaxe(&items) else {
        return Ok(None);
    };
    world.equip(pick, EquipSlot::Hand).await?;
    Ok(Some(pick.name.clone()))
}
