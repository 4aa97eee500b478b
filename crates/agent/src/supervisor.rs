//! Connection Supervisor — owns the session lifecycle.
//!
//! ```text
//! Stopped ─start()─▶ Starting ─spawned─▶ Running
//!    ▲                   │                  │
//!    │                   └──────ended───────┤
//!    │                                      ▼
//!    └──── retries exhausted ◀──── Retrying (flat backoff)
//! ```
//!
//! Every start bumps an epoch. Events, connect results and retry timers
//! carry the epoch they were created under and are dropped when it is
//! stale, so at most one session is ever live.
//!
//! A stop that we asked for (`stop()` or the membership poll hitting the
//! presence threshold) is *solicited* and never schedules a reconnect.
//! While the presence cooldown is armed a stopped supervisor reports
//! [`SessionState::CoolingDown`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use craftbot_config::SupervisorConfig;
use craftbot_core::{
    ConnectOptions, Connector, DomainEvent, EventBus, SessionEvent, SessionState, World,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::controller::Controller;
use crate::presence::{PresenceDecision, PresenceMonitor, PresenceReading, PresenceSource};

const NO_PLAYERS: &str = "No players online.";

struct LiveSession {
    world: Arc<dyn World>,
    pump: Option<JoinHandle<()>>,
    membership: Option<JoinHandle<()>>,
    /// We asked for this session to end.
    solicited: bool,
}

struct Inner {
    /// Raw lifecycle phase; never `CoolingDown`.
    phase: SessionState,
    epoch: u64,
    session: Option<LiveSession>,
    retry: Option<JoinHandle<()>>,
    reconnect_attempts: u32,
}

pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    options: ConnectOptions,
    presence: Arc<PresenceMonitor>,
    controller: Arc<Controller>,
    events: Arc<EventBus>,
    max_reconnects: u32,
    backoff: Duration,
    membership_interval: Duration,
    inner: Mutex<Inner>,
    state: watch::Sender<SessionState>,
}

impl ConnectionSupervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        options: ConnectOptions,
        presence: Arc<PresenceMonitor>,
        controller: Arc<Controller>,
        events: Arc<EventBus>,
        config: &SupervisorConfig,
        membership_interval: Duration,
    ) -> Self {
        Self {
            connector,
            options,
            presence,
            controller,
            events,
            max_reconnects: config.max_reconnects,
            backoff: Duration::from_secs(config.reconnect_backoff_secs),
            membership_interval,
            inner: Mutex::new(Inner {
                phase: SessionState::Stopped,
                epoch: 0,
                session: None,
                retry: None,
                reconnect_attempts: 0,
            }),
            state: watch::channel(SessionState::Stopped).0,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn effective(&self, phase: SessionState) -> SessionState {
        if phase == SessionState::Stopped && self.presence.counter().cooldown_armed() {
            SessionState::CoolingDown
        } else {
            phase
        }
    }

    /// The observable state.
    pub fn state(&self) -> SessionState {
        self.effective(self.lock().phase)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The live world, if a session is open.
    pub fn world(&self) -> Option<Arc<dyn World>> {
        self.lock().session.as_ref().map(|s| s.world.clone())
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.lock().reconnect_attempts
    }

    fn set_phase(&self, inner: &mut Inner, phase: SessionState) {
        inner.phase = phase;
        self.publish_state(inner);
    }

    fn publish_state(&self, inner: &Inner) {
        let to = self.effective(inner.phase);
        let from = *self.state.borrow();
        if from == to {
            return;
        }
        self.state.send_replace(to);
        info!(%from, %to, "Session state changed");
        self.events.publish(DomainEvent::SessionStateChanged {
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    /// Re-evaluate the cooldown overlay, e.g. after it expired.
    pub fn refresh_state(&self) {
        let inner = self.lock();
        self.publish_state(&inner);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Open a session unless one is already starting or running, or the
    /// presence counter is saturated. Returns whether a connect happened.
    pub async fn start(self: &Arc<Self>) -> bool {
        let epoch = {
            let mut inner = self.lock();
            if inner.phase.is_active() {
                debug!(state = %inner.phase, "Start ignored, session already active");
                return false;
            }
            if self.presence.counter().is_saturated() {
                info!("Start suppressed, presence retries exhausted");
                if inner.phase == SessionState::Retrying {
                    if let Some(retry) = inner.retry.take() {
                        retry.abort();
                    }
                    self.set_phase(&mut inner, SessionState::Stopped);
                }
                return false;
            }
            if let Some(retry) = inner.retry.take() {
                retry.abort();
            }
            inner.epoch += 1;
            self.set_phase(&mut inner, SessionState::Starting);
            inner.epoch
        };

        info!(
            host = %self.options.host,
            port = self.options.port,
            username = %self.options.username,
            "Connecting"
        );
        match self.connector.connect(&self.options).await {
            Ok(handle) => {
                let stale = {
                    let mut inner = self.lock();
                    if inner.epoch == epoch {
                        let pump = tokio::spawn(self.clone().pump(epoch, handle.events));
                        inner.session = Some(LiveSession {
                            world: handle.world.clone(),
                            pump: Some(pump),
                            membership: None,
                            solicited: false,
                        });
                        false
                    } else {
                        true
                    }
                };
                if stale {
                    debug!("Connect finished after stop, leaving");
                    if let Err(e) = handle.world.quit("stopped").await {
                        debug!(error = %e, "Quit after stale connect failed");
                    }
                    return false;
                }
                true
            }
            Err(e) => {
                if e.is_unreachable() {
                    info!(error = %e, "Server unreachable");
                } else {
                    warn!(error = %e, "Connect failed");
                }
                self.handle_ended(epoch, &format!("connect failed: {e}"));
                true
            }
        }
    }

    async fn pump(self: Arc<Self>, epoch: u64, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            if !self.is_current(epoch) {
                return;
            }
            match event {
                SessionEvent::Spawned => self.on_spawned(epoch),
                SessionEvent::Ended { reason } => {
                    self.handle_ended(epoch, &reason);
                    return;
                }
                other => self.controller.handle_event(other).await,
            }
        }
        self.handle_ended(epoch, "event stream closed");
    }

    fn on_spawned(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        let Some(world) = inner.session.as_ref().map(|s| s.world.clone()) else {
            return;
        };

        inner.reconnect_attempts = 0;
        self.set_phase(&mut inner, SessionState::Running);
        info!("✅ Spawned and ready");

        self.controller.attach(world.clone());
        let membership = tokio::spawn(self.clone().membership_loop(epoch, world));
        if let Some(session) = inner.session.as_mut() {
            session.membership = Some(membership);
        }
    }

    /// In-session presence trigger: counts connected players other than
    /// the agent.
    async fn membership_loop(self: Arc<Self>, epoch: u64, world: Arc<dyn World>) {
        let period = self.membership_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            let players = match world.players().await {
                Ok(players) => players,
                Err(e) => {
                    debug!(error = %e, "Membership poll failed");
                    continue;
                }
            };
            let others: Vec<&str> = players
                .iter()
                .map(|p| p.username.as_str())
                .filter(|name| *name != world.username())
                .collect();
            debug!(players = ?others, "Membership poll");

            let reading = PresenceReading::now(others.len() as u32, PresenceSource::Membership);
            if let PresenceDecision::Exhausted { .. } = self.presence.record(&reading) {
                self.disconnect(epoch, NO_PLAYERS).await;
                return;
            }
        }
    }

    /// Leave the server without scheduling a reconnect. The session's own
    /// `Ended` event completes the transition.
    async fn disconnect(&self, epoch: u64, reason: &str) {
        let world = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return;
            }
            match inner.session.as_mut() {
                Some(session) => {
                    session.solicited = true;
                    session.world.clone()
                }
                None => return,
            }
        };
        info!(reason, "Disconnecting");
        if let Err(e) = world.quit(reason).await {
            warn!(error = %e, "Quit failed");
        }
    }

    fn handle_ended(self: &Arc<Self>, epoch: u64, reason: &str) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.epoch += 1;

        let solicited = match inner.session.take() {
            Some(session) => {
                if let Some(membership) = session.membership {
                    membership.abort();
                }
                session.solicited
            }
            None => false,
        };
        self.controller.detach();
        self.set_phase(&mut inner, SessionState::Stopped);

        if solicited {
            info!(reason, "Session ended");
            return;
        }

        if inner.reconnect_attempts >= self.max_reconnects {
            warn!(
                reason,
                attempts = inner.reconnect_attempts,
                "Session lost and reconnect attempts exhausted, staying stopped"
            );
            return;
        }

        inner.reconnect_attempts += 1;
        let attempt = inner.reconnect_attempts;
        warn!(
            reason,
            attempt,
            max = self.max_reconnects,
            backoff_secs = self.backoff.as_secs(),
            "Session lost, reconnecting"
        );
        self.set_phase(&mut inner, SessionState::Retrying);

        let supervisor = self.clone();
        let backoff = self.backoff;
        inner.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            supervisor.lock().retry.take();
            supervisor.start().await;
        }));
    }

    /// Leave the server and cancel any pending reconnect. Returns `false`
    /// when there was nothing to stop.
    pub async fn stop(&self, reason: &str) -> bool {
        let session = {
            let mut inner = self.lock();
            if inner.phase == SessionState::Stopped && inner.session.is_none() {
                return false;
            }
            if let Some(retry) = inner.retry.take() {
                retry.abort();
            }
            inner.epoch += 1;
            let session = inner.session.take();
            self.controller.detach();
            self.set_phase(&mut inner, SessionState::Stopped);
            session
        };

        info!(reason, "Stopping session");
        if let Some(session) = session {
            if let Some(membership) = session.membership {
                membership.abort();
            }
            if let Err(e) = session.world.quit(reason).await {
                warn!(error = %e, "Quit failed");
            }
            if let Some(pump) = session.pump {
                pump.abort();
            }
        }
        true
    }
}

/// One scheduled presence check: poll, decide, act.
pub async fn ping_and_decide(
    monitor: &PresenceMonitor,
    supervisor: &Arc<ConnectionSupervisor>,
) -> Option<PresenceDecision> {
    supervisor.refresh_state();

    let reading = match monitor.poll().await {
        Ok(reading) => reading,
        Err(e) if e.is_unreachable() => {
            info!("Server offline (connection refused), ignoring");
            return None;
        }
        Err(e) => {
            error!(error = %e, "Unexpected error pinging server");
            return None;
        }
    };

    let decision = monitor.record(&reading);
    match decision {
        PresenceDecision::Present => {
            if !supervisor.state().is_active() {
                supervisor.start().await;
            }
        }
        PresenceDecision::Absent { .. } => {}
        PresenceDecision::Exhausted { .. } => {
            supervisor.stop(NO_PLAYERS).await;
        }
    }
    supervisor.refresh_state();
    Some(decision)
}

/// Run [`ping_and_decide`] now and then every `period`.
pub fn spawn_ping_loop(
    monitor: Arc<PresenceMonitor>,
    supervisor: Arc<ConnectionSupervisor>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut cooldown = monitor.counter().subscribe_cooldown();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    ping_and_decide(&monitor, &supervisor).await;
                }
                Ok(()) = cooldown.changed() => supervisor.refresh_state(),
            }
        }
    })
}
