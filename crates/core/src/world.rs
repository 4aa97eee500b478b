//! World trait — the abstraction over a live game session.
//!
//! A World exposes block/entity queries, inventory enumeration, the
//! interaction primitives (equip, dig, place, pick up, deposit) and a single
//! settable navigation goal. Every call is asynchronous and fallible: the
//! session lives in another process and the world mutates underneath us.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::goal::Goal;

pub type WorldResult<T> = std::result::Result<T, ActionError>;

/// A continuous position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn plus(&self, other: Vec3) -> Self {
        self.offset(other.x, other.y, other.z)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// The block containing this point.
    pub fn floored(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn up(&self) -> Self {
        self.offset(0, 1, 0)
    }

    /// The lower corner as a continuous position.
    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    pub fn center(&self) -> Vec3 {
        self.as_vec3().offset(0.5, 0.5, 0.5)
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six faces of a block, in the wire order used by raycasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Face {
    Bottom,
    Top,
    North,
    South,
    West,
    East,
}

impl Face {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Face::Bottom),
            1 => Some(Face::Top),
            2 => Some(Face::North),
            3 => Some(Face::South),
            4 => Some(Face::West),
            5 => Some(Face::East),
            _ => None,
        }
    }

    /// Unit offset pointing out of this face.
    pub fn normal(&self) -> BlockPos {
        match self {
            Face::Bottom => BlockPos::new(0, -1, 0),
            Face::Top => BlockPos::new(0, 1, 0),
            Face::North => BlockPos::new(0, 0, -1),
            Face::South => BlockPos::new(0, 0, 1),
            Face::West => BlockPos::new(-1, 0, 0),
            Face::East => BlockPos::new(1, 0, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub pos: BlockPos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    /// A dropped item lying on the ground.
    Item,
    Mob,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub kind: EntityKind,
    /// Username for players, item name for drops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: Vec3,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub pitch: f64,
}

impl Entity {
    pub fn eye_position(&self) -> Vec3 {
        self.position.offset(0.0, self.height, 0.0)
    }

    /// Unit vector the entity is looking along.
    pub fn look_direction(&self) -> Vec3 {
        Vec3::new(
            -self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        )
    }
}

/// A connected participant. `entity` is `None` when they are outside
/// our view distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub count: u32,
    pub slot: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Hand,
    OffHand,
    Head,
    Torso,
    Legs,
    Feet,
}

/// Query for blocks by name around the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockQuery {
    pub names: Vec<String>,
    pub max_distance: u32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    pub block: Block,
    pub face: Face,
}

/// The live game session as seen by the agent.
///
/// Inventory and block reads are snapshots: callers must re-read them at
/// every decision point instead of caching across awaits.
#[async_trait]
pub trait World: Send + Sync {
    /// The agent's own username in this session.
    fn username(&self) -> &str;

    async fn position(&self) -> WorldResult<Vec3>;

    async fn on_ground(&self) -> WorldResult<bool>;

    async fn dimension(&self) -> WorldResult<String>;

    /// All connected players, the agent included.
    async fn players(&self) -> WorldResult<Vec<PlayerInfo>>;

    async fn entities(&self) -> WorldResult<Vec<Entity>>;

    async fn block_at(&self, pos: BlockPos) -> WorldResult<Option<Block>>;

    /// Positions of matching blocks, nearest first.
    async fn find_blocks(&self, query: &BlockQuery) -> WorldResult<Vec<BlockPos>>;

    async fn can_dig(&self, block: &Block) -> WorldResult<bool>;

    async fn inventory(&self) -> WorldResult<Vec<Item>>;

    async fn equip(&self, item: &Item, slot: EquipSlot) -> WorldResult<()>;

    async fn best_harvest_tool(&self, block: &Block) -> WorldResult<Option<Item>>;

    async fn dig(&self, block: &Block) -> WorldResult<()>;

    async fn place_block(&self, against: &Block, face: Face) -> WorldResult<()>;

    async fn look_at(&self, target: Vec3) -> WorldResult<()>;

    async fn pick_up(&self, entity: &Entity) -> WorldResult<()>;

    async fn consume(&self, item: &Item) -> WorldResult<()>;

    /// Move one inventory stack into the container at `container`.
    async fn deposit(&self, container: BlockPos, item: &Item) -> WorldResult<()>;

    /// Replace the pathfinder's target. `None` clears it.
    ///
    /// `dynamic` goals are re-evaluated by the pathfinder as the target moves.
    async fn set_goal(&self, goal: Option<&Goal>, dynamic: bool) -> WorldResult<()>;

    /// Navigate to `goal` and resolve once it is reached.
    async fn goto(&self, goal: &Goal) -> WorldResult<()>;

    async fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f64,
    ) -> WorldResult<Option<RayHit>>;

    async fn set_jump(&self, pressed: bool) -> WorldResult<()>;

    async fn chat(&self, text: &str) -> WorldResult<()>;

    /// Leave the server. The session emits `Ended` afterwards.
    async fn quit(&self, reason: &str) -> WorldResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_indices_match_normals() {
        assert_eq!(Face::from_index(1).unwrap().normal(), BlockPos::new(0, 1, 0));
        assert_eq!(Face::from_index(4).unwrap().normal(), BlockPos::new(-1, 0, 0));
        assert!(Face::from_index(6).is_none());
    }

    #[test]
    fn floored_rounds_towards_negative_infinity() {
        let pos = Vec3::new(-0.5, 64.9, 3.2).floored();
        assert_eq!(pos, BlockPos::new(-1, 64, 3));
    }

    #[test]
    fn look_direction_straight_ahead() {
        let entity = Entity {
            id: 1,
            kind: EntityKind::Player,
            name: Some("steve".into()),
            position: Vec3::default(),
            height: 1.62,
            yaw: 0.0,
            pitch: 0.0,
        };
        let dir = entity.look_direction();
        assert!((dir.z + 1.0).abs() < 1e-9);
        assert!(dir.y.abs() < 1e-9);
        assert!((entity.eye_position().y - 1.62).abs() < 1e-9);
    }
}
