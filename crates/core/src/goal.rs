//! Navigation goals consumed by the external pathfinder.

use serde::{Deserialize, Serialize};

use crate::world::{BlockPos, Vec3};

/// A declarative navigation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Goal {
    /// Get within `range` of a point.
    Near { pos: Vec3, range: f64 },
    /// Stand inside a specific block.
    Block { pos: BlockPos },
    /// Reach a column, any height.
    Xz { x: i32, z: i32 },
    /// Reach a height, anywhere.
    Y { y: i32 },
    /// Stay within `range` of an entity.
    Follow { entity_id: u32, range: f64 },
    /// Satisfied whenever the inner goal is not.
    Invert { goal: Box<Goal> },
    /// Stand where a block can be placed at `pos`.
    PlaceBlock { pos: BlockPos, range: f64 },
    /// Stand where the block at `pos` is visible and in reach.
    LookAtBlock { pos: BlockPos, range: f64 },
}

impl Goal {
    pub fn near(pos: Vec3, range: f64) -> Self {
        Goal::Near { pos, range }
    }

    pub fn near_block(pos: BlockPos, range: f64) -> Self {
        Goal::Near {
            pos: pos.as_vec3(),
            range,
        }
    }

    pub fn invert(goal: Goal) -> Self {
        Goal::Invert {
            goal: Box::new(goal),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Goal::Near { .. } => "near",
            Goal::Block { .. } => "block",
            Goal::Xz { .. } => "xz",
            Goal::Y { .. } => "y",
            Goal::Follow { .. } => "follow",
            Goal::Invert { .. } => "invert",
            Goal::PlaceBlock { .. } => "place_block",
            Goal::LookAtBlock { .. } => "look_at_block",
        }
    }
}
