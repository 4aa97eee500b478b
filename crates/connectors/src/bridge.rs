//! Game client bridge — drives a live session over newline-delimited JSON.
//!
//! The bridge process owns the actual game client (protocol, physics,
//! pathfinding). We talk to it over one TCP connection:
//!
//! ```text
//! -> {"id":7,"op":"dig","args":{"block":{...}}}
//! <- {"id":7,"ok":true,"result":null}
//! <- {"id":8,"ok":false,"error":{"kind":"no_path","message":"..."}}
//! <- {"event":"chat","username":"alex","message":"!come"}
//! ```
//!
//! Responses may arrive out of order; a reader task routes each one to the
//! waiting request by id and forwards every `event` line to the session's
//! event channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use craftbot_core::{
    ActionError, Block, BlockPos, BlockQuery, ConnectOptions, Connector, Entity, EquipSlot, Face,
    Goal, Item, PlayerInfo, RayHit, SessionEvent, SessionHandle, TransportError, Vec3, World,
    WorldResult,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// Opens sessions through a bridge listening at `addr`.
pub struct BridgeConnector {
    addr: String,
    request_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(addr: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionHandle, TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::from_io(&e))?;
        let (read, write) = stream.into_split();
        let (event_tx, events) = mpsc::channel(256);

        let world = Arc::new(BridgeWorld {
            username: options.username.clone(),
            writer: tokio::sync::Mutex::new(write),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            request_timeout: self.request_timeout,
        });

        tokio::spawn(read_loop(read, world.pending.clone(), event_tx));

        world
            .request::<Value>("connect", json!(options))
            .await
            .map_err(|e| match e {
                ActionError::Transport(msg) => TransportError::Io(msg),
                other => TransportError::Protocol(other.to_string()),
            })?;

        debug!(addr = %self.addr, host = %options.host, port = options.port, "Bridge session opened");

        Ok(SessionHandle { world, events })
    }
}

/// The [`World`] exposed by a bridge session.
pub struct BridgeWorld {
    username: String,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_id: AtomicU64,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    kind: String,
    #[serde(default)]
    message: String,
}

impl From<WireError> for ActionError {
    fn from(err: WireError) -> Self {
        match err.kind.as_str() {
            "cancelled" => ActionError::Cancelled,
            "no_path" => ActionError::NoPath(err.message),
            "out_of_reach" => ActionError::OutOfReach,
            "not_found" => ActionError::NotFound(err.message),
            kind => ActionError::failed(kind, err.message),
        }
    }
}

impl BridgeWorld {
    async fn request<T: DeserializeOwned>(&self, op: &str, args: Value) -> WorldResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let line = format!("{}\n", json!({ "id": id, "op": op, "args": args }));
        trace!(id, op, "bridge request");

        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            lock(&self.pending).remove(&id);
            return Err(TransportError::from_io(&e).into());
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(TransportError::SessionClosed.into()),
            Err(_) => {
                lock(&self.pending).remove(&id);
                return Err(ActionError::failed(op, "bridge did not answer in time"));
            }
        };

        if !response.ok {
            return Err(response
                .error
                .map(ActionError::from)
                .unwrap_or_else(|| ActionError::failed(op, "unspecified error")));
        }

        serde_json::from_value(response.result)
            .map_err(|e| ActionError::failed(op, format!("invalid result: {e}")))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Demultiplex bridge output until the connection closes.
///
/// Pending requests are dropped on close so their callers observe
/// `SessionClosed`; the session always ends with one `Ended` event.
async fn read_loop(read: OwnedReadHalf, pending: Pending, events: mpsc::Sender<SessionEvent>) {
    let mut lines = BufReader::new(read).lines();
    let mut ended = false;

    let reason = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break "bridge closed the connection".to_string(),
            Err(e) => break format!("bridge read failed: {e}"),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed bridge line");
                continue;
            }
        };

        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            let waiter = lock(&pending).remove(&id);
            match (waiter, serde_json::from_value::<Response>(value)) {
                (Some(tx), Ok(response)) => {
                    let _ = tx.send(response);
                }
                (None, _) => trace!(id, "response for abandoned request"),
                (Some(_), Err(e)) => warn!(id, error = %e, "Malformed bridge response"),
            }
            continue;
        }

        match serde_json::from_value::<SessionEvent>(value) {
            Ok(event) => {
                ended = matches!(event, SessionEvent::Ended { .. });
                if events.send(event).await.is_err() || ended {
                    break "session ended".to_string();
                }
            }
            Err(e) => debug!(error = %e, "Unknown bridge event"),
        }
    };

    lock(&pending).clear();
    if !ended {
        let _ = events.send(SessionEvent::Ended { reason }).await;
    }
}

#[async_trait]
impl World for BridgeWorld {
    fn username(&self) -> &str {
        &self.username
    }

    async fn position(&self) -> WorldResult<Vec3> {
        self.request("position", json!({})).await
    }

    async fn on_ground(&self) -> WorldResult<bool> {
        self.request("on_ground", json!({})).await
    }

    async fn dimension(&self) -> WorldResult<String> {
        self.request("dimension", json!({})).await
    }

    async fn players(&self) -> WorldResult<Vec<PlayerInfo>> {
        self.request("players", json!({})).await
    }

    async fn entities(&self) -> WorldResult<Vec<Entity>> {
        self.request("entities", json!({})).await
    }

    async fn block_at(&self, pos: BlockPos) -> WorldResult<Option<Block>> {
        self.request("block_at", json!({ "pos": pos })).await
    }

    async fn find_blocks(&self, query: &BlockQuery) -> WorldResult<Vec<BlockPos>> {
        self.request("find_blocks", json!(query)).await
    }

    async fn can_dig(&self, block: &Block) -> WorldResult<bool> {
        self.request("can_dig", json!({ "block": block })).await
    }

    async fn inventory(&self) -> WorldResult<Vec<Item>> {
        self.request("inventory", json!({})).await
    }

    async fn equip(&self, item: &Item, slot: EquipSlot) -> WorldResult<()> {
        self.request("equip", json!({ "item": item, "slot": slot }))
            .await
    }

    async fn best_harvest_tool(&self, block: &Block) -> WorldResult<Option<Item>> {
        self.request("best_harvest_tool", json!({ "block": block }))
            .await
    }

    async fn dig(&self, block: &Block) -> WorldResult<()> {
        self.request("dig", json!({ "block": block })).await
    }

    async fn place_block(&self, against: &Block, face: Face) -> WorldResult<()> {
        self.request("place_block", json!({ "against": against, "face": face }))
            .await
    }

    async fn look_at(&self, target: Vec3) -> WorldResult<()> {
        self.request("look_at", json!({ "target": target })).await
    }

    async fn pick_up(&self, entity: &Entity) -> WorldResult<()> {
        self.request("pick_up", json!({ "entity": entity })).await
    }

    async fn consume(&self, item: &Item) -> WorldResult<()> {
        self.request("consume", json!({ "item": item })).await
    }

    async fn deposit(&self, container: BlockPos, item: &Item) -> WorldResult<()> {
        self.request("deposit", json!({ "container": container, "item": item }))
            .await
    }

    async fn set_goal(&self, goal: Option<&Goal>, dynamic: bool) -> WorldResult<()> {
        self.request("set_goal", json!({ "goal": goal, "dynamic": dynamic }))
            .await
    }

    async fn goto(&self, goal: &Goal) -> WorldResult<()> {
        self.request("goto", json!({ "goal": goal })).await
    }

    async fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f64,
    ) -> WorldResult<Option<RayHit>> {
        self.request(
            "raycast",
            json!({ "origin": origin, "direction": direction, "max_distance": max_distance }),
        )
        .await
    }

    async fn set_jump(&self, pressed: bool) -> WorldResult<()> {
        self.request("set_control", json!({ "control": "jump", "state": pressed }))
            .await
    }

    async fn chat(&self, text: &str) -> WorldResult<()> {
        self.request("chat", json!({ "text": text })).await
    }

    async fn quit(&self, reason: &str) -> WorldResult<()> {
        self.request("quit", json!({ "reason": reason })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection and answer with `reply` for every request.
    async fn fake_bridge(
        reply: impl Fn(&Value) -> Vec<String> + Send + 'static,
    ) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                for out in reply(&request) {
                    write.write_all(format!("{out}\n").as_bytes()).await.unwrap();
                }
            }
        });
        (addr, handle)
    }

    fn options() -> ConnectOptions {
        ConnectOptions {
            host: "localhost".into(),
            port: 25565,
            username: "Aisha".into(),
        }
    }

    #[test]
    fn wire_errors_map_to_action_errors() {
        let err: ActionError = WireError {
            kind: "no_path".into(),
            message: "blocked".into(),
        }
        .into();
        assert_eq!(err, ActionError::NoPath("blocked".into()));

        let err: ActionError = WireError {
            kind: "dig".into(),
            message: "too slow".into(),
        }
        .into();
        assert!(err.to_string().contains("too slow"));
    }

    #[tokio::test]
    async fn requests_and_events_are_demultiplexed() {
        let (addr, _server) = fake_bridge(|req| {
            let id = req["id"].as_u64().unwrap();
            match req["op"].as_str().unwrap() {
                "connect" => vec![
                    json!({"id": id, "ok": true, "result": null}).to_string(),
                    json!({"event": "spawned"}).to_string(),
                ],
                "position" => vec![
                    json!({"event": "chat", "username": "alex", "message": "!come"}).to_string(),
                    json!({"id": id, "ok": true, "result": {"x": 1.5, "y": 64.0, "z": -3.0}})
                        .to_string(),
                ],
                "dig" => vec![
                    json!({"id": id, "ok": false, "error": {"kind": "out_of_reach"}}).to_string(),
                ],
                _ => vec![],
            }
        })
        .await;

        let connector = BridgeConnector::new(addr, Duration::from_secs(5));
        let mut session = connector.connect(&options()).await.unwrap();
        assert_eq!(session.world.username(), "Aisha");

        let pos = session.world.position().await.unwrap();
        assert_eq!(pos, Vec3::new(1.5, 64.0, -3.0));

        let block = Block {
            name: "oak_log".into(),
            pos: BlockPos::new(0, 64, 0),
        };
        assert_eq!(
            session.world.dig(&block).await,
            Err(ActionError::OutOfReach)
        );

        assert_eq!(session.events.recv().await, Some(SessionEvent::Spawned));
        assert_eq!(
            session.events.recv().await,
            Some(SessionEvent::Chat {
                username: "alex".into(),
                message: "!come".into()
            })
        );
    }

    #[tokio::test]
    async fn closed_bridge_ends_session() {
        let (addr, server) = fake_bridge(|req| {
            let id = req["id"].as_u64().unwrap();
            vec![json!({"id": id, "ok": true, "result": null}).to_string()]
        })
        .await;

        let connector = BridgeConnector::new(addr, Duration::from_secs(5));
        let mut session = connector.connect(&options()).await.unwrap();
        server.abort();

        loop {
            match session.events.recv().await {
                Some(SessionEvent::Ended { .. }) => break,
                Some(_) => continue,
                None => panic!("event stream closed without Ended"),
            }
        }
    }

    #[tokio::test]
    async fn refused_connect_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = BridgeConnector::new(addr, Duration::from_secs(1))
            .connect(&options())
            .await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }
}
