//! Presence Monitor — decides whether real players are around.
//!
//! Two triggers feed one decision function: the scheduled status ping and
//! the in-session membership poll. Both share a single [`RetryCounter`], so
//! the threshold counts empty readings from either source and the cooldown
//! is armed at most once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use craftbot_config::PresenceConfig;
use craftbot_core::{DomainEvent, EventBus, StatusSource, TransportError};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct CounterState {
    value: u32,
    cooldown_armed: bool,
}

/// Consecutive empty presence readings, bounded by `max`.
///
/// Once saturated the session must stay down until the cooldown resets the
/// counter or a positive reading does.
#[derive(Debug)]
pub struct RetryCounter {
    max: u32,
    state: Mutex<CounterState>,
    cooldown: watch::Sender<bool>,
}

impl RetryCounter {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            state: Mutex::new(CounterState::default()),
            cooldown: watch::channel(false).0,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn value(&self) -> u32 {
        self.lock().value
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Count one empty reading. Never exceeds `max`.
    pub fn increment(&self) -> u32 {
        let mut state = self.lock();
        state.value = (state.value + 1).min(self.max);
        state.value
    }

    pub fn reset(&self) {
        self.lock().value = 0;
    }

    pub fn is_saturated(&self) -> bool {
        self.lock().value >= self.max
    }

    pub fn cooldown_armed(&self) -> bool {
        self.lock().cooldown_armed
    }

    /// Changes whenever the cooldown is armed or expires.
    pub fn subscribe_cooldown(&self) -> watch::Receiver<bool> {
        self.cooldown.subscribe()
    }

    /// Returns `true` only for the caller that armed it.
    fn try_arm_cooldown(&self) -> bool {
        let mut state = self.lock();
        if state.cooldown_armed {
            return false;
        }
        state.cooldown_armed = true;
        self.cooldown.send_replace(true);
        true
    }

    fn finish_cooldown(&self) {
        let mut state = self.lock();
        state.value = 0;
        state.cooldown_armed = false;
        self.cooldown.send_replace(false);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceSource {
    Ping,
    Membership,
}

impl PresenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceSource::Ping => "ping",
            PresenceSource::Membership => "membership",
        }
    }
}

/// One observation of how many non-agent players are connected.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceReading {
    pub timestamp: DateTime<Utc>,
    pub online_players: u32,
    pub source: PresenceSource,
}

impl PresenceReading {
    pub fn now(online_players: u32, source: PresenceSource) -> Self {
        Self {
            timestamp: Utc::now(),
            online_players,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceDecision {
    /// Someone is online; the counter was reset.
    Present,
    /// Nobody online, threshold not reached yet.
    Absent { attempt: u32, max: u32 },
    /// Threshold reached. The session must go down.
    Exhausted { attempt: u32 },
}

pub struct PresenceMonitor {
    counter: Arc<RetryCounter>,
    cooldown: Duration,
    status: Arc<dyn StatusSource>,
    host: String,
    port: u16,
    events: Arc<EventBus>,
}

impl PresenceMonitor {
    pub fn new(
        config: &PresenceConfig,
        status: Arc<dyn StatusSource>,
        host: impl Into<String>,
        port: u16,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            counter: Arc::new(RetryCounter::new(config.max_retries)),
            cooldown: Duration::from_secs(config.cooldown_secs),
            status,
            host: host.into(),
            port,
            events,
        }
    }

    pub fn counter(&self) -> &Arc<RetryCounter> {
        &self.counter
    }

    /// Query the server status endpoint.
    pub async fn poll(&self) -> Result<PresenceReading, TransportError> {
        let status = self.status.query_status(&self.host, self.port).await?;
        Ok(PresenceReading::now(status.online_players, PresenceSource::Ping))
    }

    /// The single decision function for every presence trigger.
    pub fn record(&self, reading: &PresenceReading) -> PresenceDecision {
        let decision = if reading.online_players > 0 {
            self.counter.reset();
            info!(
                online = reading.online_players,
                source = reading.source.as_str(),
                "Real players online"
            );
            PresenceDecision::Present
        } else {
            let attempt = self.counter.increment();
            let max = self.counter.max();
            info!(
                attempt,
                max,
                source = reading.source.as_str(),
                "No real players online"
            );
            if attempt >= max {
                warn!(attempt, "Presence retries exhausted");
                self.arm_cooldown();
                PresenceDecision::Exhausted { attempt }
            } else {
                PresenceDecision::Absent { attempt, max }
            }
        };

        self.events.publish(DomainEvent::PresenceObserved {
            source: reading.source.as_str().into(),
            online_players: reading.online_players,
            retry_count: self.counter.value(),
            timestamp: reading.timestamp,
        });

        decision
    }

    fn arm_cooldown(&self) {
        if !self.counter.try_arm_cooldown() {
            return;
        }

        let counter = self.counter.clone();
        let cooldown = self.cooldown;
        info!(secs = cooldown.as_secs(), "Retry cooldown started");
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            counter.finish_cooldown();
            info!("Retry cooldown ended, session may start again");
        });
    }
}
