//! Scripted collaborators shared by the agent tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use craftbot_core::{
    ActionError, Block, BlockPos, BlockQuery, ConnectOptions, Connector, Entity, EntityKind,
    EquipSlot, Face, GeneratorError, Goal, Item, PlayerInfo, RayHit, ServerStatus, SessionEvent,
    SessionHandle, StatusSource, TextGenerator, TransportError, Vec3, World, WorldResult,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoMode {
    Succeed,
    Fail,
    /// Never resolves; only cancellation ends it.
    Hang,
}

#[derive(Default)]
struct WorldState {
    position: Vec3,
    on_ground: bool,
    players: Vec<PlayerInfo>,
    entities: Vec<Entity>,
    blocks: HashMap<BlockPos, Block>,
    undiggable: HashSet<BlockPos>,
    /// `(name matched by find_blocks, position)` in scan order.
    scan: Vec<(String, BlockPos)>,
    inventory: Vec<Item>,
    ray: Option<RayHit>,
    harvest_tool: Option<Item>,
    goto_mode: Option<GotoMode>,
    calls: Vec<String>,
    events: Option<mpsc::Sender<SessionEvent>>,
}

/// An in-memory world that records every call.
pub struct MockWorld {
    username: String,
    state: Mutex<WorldState>,
}

impl MockWorld {
    pub fn new(username: &str) -> Self {
        let world = Self {
            username: username.into(),
            state: Mutex::new(WorldState {
                position: Vec3::new(0.0, 64.0, 0.0),
                on_ground: true,
                ..WorldState::default()
            }),
        };
        world.add_player(username, None);
        world
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WorldState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn chats(&self) -> Vec<String> {
        self.calls_with_prefix("chat:")
            .into_iter()
            .map(|c| c["chat:".len()..].to_string())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn set_goto_mode(&self, mode: GotoMode) {
        self.state().goto_mode = Some(mode);
    }

    pub fn set_position(&self, pos: Vec3) {
        self.state().position = pos;
    }

    /// Add a connected player, optionally visible as an entity.
    pub fn add_player(&self, username: &str, entity: Option<Entity>) {
        let mut state = self.state();
        state.players.retain(|p| p.username != username);
        state.players.push(PlayerInfo {
            username: username.into(),
            entity,
        });
    }

    pub fn remove_player(&self, username: &str) {
        self.state().players.retain(|p| p.username != username);
    }

    /// Add a visible player standing at `pos`.
    pub fn add_visible_player(&self, username: &str, id: u32, pos: Vec3) -> Entity {
        let entity = player_entity(username, id, pos);
        self.add_player(username, Some(entity.clone()));
        entity
    }

    pub fn add_entity(&self, entity: Entity) {
        self.state().entities.push(entity);
    }

    pub fn set_block(&self, name: &str, pos: BlockPos) {
        self.state().blocks.insert(
            pos,
            Block {
                name: name.into(),
                pos,
            },
        );
    }

    pub fn set_undiggable(&self, pos: BlockPos) {
        self.state().undiggable.insert(pos);
    }

    /// Make `find_blocks` report `pos` for queries naming `as_name`.
    pub fn add_scan_result(&self, as_name: &str, pos: BlockPos) {
        self.state().scan.push((as_name.into(), pos));
    }

    pub fn give(&self, name: &str, count: u32) {
        let mut state = self.state();
        let slot = state.inventory.len() as u16 + 9;
        state.inventory.push(Item {
            name: name.into(),
            count,
            slot,
        });
    }

    pub fn inventory_names(&self) -> Vec<String> {
        self.state().inventory.iter().map(|i| i.name.clone()).collect()
    }

    pub fn set_ray(&self, hit: Option<RayHit>) {
        self.state().ray = hit;
    }

    pub fn set_harvest_tool(&self, item: Option<Item>) {
        self.state().harvest_tool = item;
    }

    pub fn attach_events(&self, tx: mpsc::Sender<SessionEvent>) {
        self.state().events = Some(tx);
    }

    /// Push an event into the session as if the server sent it.
    pub async fn emit(&self, event: SessionEvent) {
        let tx = self.state().events.clone();
        if let Some(tx) = tx {
            tx.send(event).await.unwrap();
        }
    }
}

pub fn player_entity(username: &str, id: u32, pos: Vec3) -> Entity {
    Entity {
        id,
        kind: EntityKind::Player,
        name: Some(username.into()),
        position: pos,
        height: 1.62,
        yaw: 0.0,
        pitch: 0.0,
    }
}

pub fn item_entity(id: u32, pos: Vec3) -> Entity {
    Entity {
        id,
        kind: EntityKind::Item,
        name: Some("oak_log".into()),
        position: pos,
        height: 0.25,
        yaw: 0.0,
        pitch: 0.0,
    }
}

#[async_trait]
impl World for MockWorld {
    fn username(&self) -> &str {
        &self.username
    }

    async fn position(&self) -> WorldResult<Vec3> {
        Ok(self.state().position)
    }

    async fn on_ground(&self) -> WorldResult<bool> {
        Ok(self.state().on_ground)
    }

    async fn dimension(&self) -> WorldResult<String> {
        Ok("overworld".into())
    }

    async fn players(&self) -> WorldResult<Vec<PlayerInfo>> {
        Ok(self.state().players.clone())
    }

    async fn entities(&self) -> WorldResult<Vec<Entity>> {
        Ok(self.state().entities.clone())
    }

    async fn block_at(&self, pos: BlockPos) -> WorldResult<Option<Block>> {
        Ok(self.state().blocks.get(&pos).cloned())
    }

    async fn find_blocks(&self, query: &BlockQuery) -> WorldResult<Vec<BlockPos>> {
        self.record(format!("find_blocks:{}", query.names.join(",")));
        Ok(self
            .state()
            .scan
            .iter()
            .filter(|(name, _)| query.names.contains(name))
            .map(|(_, pos)| *pos)
            .take(query.count)
            .collect())
    }

    async fn can_dig(&self, block: &Block) -> WorldResult<bool> {
        Ok(!self.state().undiggable.contains(&block.pos))
    }

    async fn inventory(&self) -> WorldResult<Vec<Item>> {
        Ok(self.state().inventory.clone())
    }

    async fn equip(&self, item: &Item, slot: EquipSlot) -> WorldResult<()> {
        self.record(format!("equip:{}:{:?}", item.name, slot));
        Ok(())
    }

    async fn best_harvest_tool(&self, _block: &Block) -> WorldResult<Option<Item>> {
        Ok(self.state().harvest_tool.clone())
    }

    async fn dig(&self, block: &Block) -> WorldResult<()> {
        self.record(format!("dig:{}", block.pos));
        self.state().blocks.remove(&block.pos);
        Ok(())
    }

    async fn place_block(&self, against: &Block, face: Face) -> WorldResult<()> {
        self.record(format!("place_block:{}:{:?}", against.pos, face));
        Ok(())
    }

    async fn look_at(&self, target: Vec3) -> WorldResult<()> {
        self.record(format!("look_at:{target}"));
        Ok(())
    }

    async fn pick_up(&self, entity: &Entity) -> WorldResult<()> {
        self.record(format!("pick_up:{}", entity.id));
        self.state().entities.retain(|e| e.id != entity.id);
        Ok(())
    }

    async fn consume(&self, item: &Item) -> WorldResult<()> {
        self.record(format!("consume:{}", item.name));
        Ok(())
    }

    async fn deposit(&self, _container: BlockPos, item: &Item) -> WorldResult<()> {
        self.record(format!("deposit:{}", item.name));
        self.state().inventory.retain(|i| i.slot != item.slot);
        Ok(())
    }

    async fn set_goal(&self, goal: Option<&Goal>, dynamic: bool) -> WorldResult<()> {
        let label = goal.map(Goal::label).unwrap_or("none");
        self.record(format!("set_goal:{label}:{dynamic}"));
        Ok(())
    }

    async fn goto(&self, goal: &Goal) -> WorldResult<()> {
        self.record(format!("goto:{}", goal.label()));
        let mode = self.state().goto_mode.unwrap_or(GotoMode::Succeed);
        match mode {
            GotoMode::Succeed => Ok(()),
            GotoMode::Fail => Err(ActionError::NoPath("scripted".into())),
            GotoMode::Hang => std::future::pending().await,
        }
    }

    async fn raycast(
        &self,
        _origin: Vec3,
        _direction: Vec3,
        _max_distance: f64,
    ) -> WorldResult<Option<RayHit>> {
        Ok(self.state().ray.clone())
    }

    async fn set_jump(&self, pressed: bool) -> WorldResult<()> {
        self.record(format!("set_jump:{pressed}"));
        Ok(())
    }

    async fn chat(&self, text: &str) -> WorldResult<()> {
        self.record(format!("chat:{text}"));
        Ok(())
    }

    async fn quit(&self, reason: &str) -> WorldResult<()> {
        self.record(format!("quit:{reason}"));
        let tx = self.state().events.clone();
        if let Some(tx) = tx {
            let _ = tx
                .send(SessionEvent::Ended {
                    reason: reason.into(),
                })
                .await;
        }
        Ok(())
    }
}

// --- Connector ---

#[derive(Debug, Clone)]
pub enum ConnectMode {
    /// Emit `Spawned` and stay connected.
    Spawn,
    /// End the session right away, before spawning.
    EndImmediately,
    Fail(TransportError),
}

/// Opens [`MockWorld`] sessions and records when each connect happened.
pub struct MockConnector {
    mode: Mutex<ConnectMode>,
    extra_players: Vec<String>,
    connects: Mutex<Vec<tokio::time::Instant>>,
    worlds: Mutex<Vec<Arc<MockWorld>>>,
}

impl MockConnector {
    pub fn new(mode: ConnectMode) -> Arc<Self> {
        Self::with_players(mode, &[])
    }

    /// Every session also lists these (non-agent) players.
    pub fn with_players(mode: ConnectMode, players: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            extra_players: players.iter().map(|p| p.to_string()).collect(),
            connects: Mutex::new(Vec::new()),
            worlds: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: ConnectMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn connect_times(&self) -> Vec<tokio::time::Instant> {
        self.connects.lock().unwrap().clone()
    }

    pub fn last_world(&self) -> Option<Arc<MockWorld>> {
        self.worlds.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionHandle, TransportError> {
        self.connects
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        let mode = self.mode.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(64);
        let world = Arc::new(MockWorld::new(&options.username));
        for player in &self.extra_players {
            world.add_player(player, None);
        }
        world.attach_events(tx.clone());

        match mode {
            ConnectMode::Fail(err) => return Err(err),
            ConnectMode::Spawn => {
                tx.send(SessionEvent::Login).await.unwrap();
                tx.send(SessionEvent::Spawned).await.unwrap();
            }
            ConnectMode::EndImmediately => {
                tx.send(SessionEvent::Ended {
                    reason: "kicked".into(),
                })
                .await
                .unwrap();
            }
        }

        self.worlds.lock().unwrap().push(world.clone());
        Ok(SessionHandle { world, events: rx })
    }
}

// --- Status ---

pub struct FixedStatus {
    result: Mutex<Result<u32, TransportError>>,
}

impl FixedStatus {
    pub fn online(count: u32) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(count)),
        })
    }

    pub fn set_online(&self, count: u32) {
        *self.result.lock().unwrap() = Ok(count);
    }

    pub fn fail(&self, err: TransportError) {
        *self.result.lock().unwrap() = Err(err);
    }
}

#[async_trait]
impl StatusSource for FixedStatus {
    async fn query_status(&self, _host: &str, _port: u16) -> Result<ServerStatus, TransportError> {
        self.result
            .lock()
            .unwrap()
            .clone()
            .map(|online| ServerStatus {
                online_players: online,
                max_players: 20,
                version: None,
            })
    }
}

// --- Generator ---

/// Returns scripted replies in order and records every prompt.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GeneratorError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, GeneratorError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GeneratorError::EmptyResponse))
    }
}
