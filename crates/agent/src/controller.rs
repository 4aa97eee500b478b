//! Session controller — routes live session events.
//!
//! The supervisor owns the connection; the controller owns what happens
//! inside it. [`Controller::attach`] builds a fresh [`SessionContext`] when
//! the agent spawns and [`Controller::detach`] tears it down, so no timer or
//! loop outlives its session.

use std::sync::{Arc, Mutex};

use craftbot_config::{AppConfig, BehaviorConfig, MaintenanceConfig};
use craftbot_core::{SessionEvent, World};
use craftbot_security::{AuditEvent, AuditLogger, AuditOutcome};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::behaviors::maintenance::{self, HungerPolicy};
use crate::behaviors::DropPickup;
use crate::coordinator::TaskCoordinator;
use crate::dispatcher::{Directive, Dispatcher};

pub use crate::behaviors::maintenance::ActivityClock;

/// State scoped to one spawned session.
pub struct SessionContext {
    world: Arc<dyn World>,
    pub coordinator: Arc<TaskCoordinator>,
    pub drops: Arc<DropPickup>,
    hunger: Mutex<HungerPolicy>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl SessionContext {
    pub fn new(
        world: Arc<dyn World>,
        behaviors: &BehaviorConfig,
        maintenance: &MaintenanceConfig,
    ) -> Self {
        Self {
            coordinator: Arc::new(TaskCoordinator::new(world.clone())),
            world,
            drops: Arc::new(DropPickup::from_config(behaviors)),
            hunger: Mutex::new(HungerPolicy::from_config(maintenance)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<AbortHandle>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Abort `handle` when the session shuts down.
    pub fn track(&self, handle: AbortHandle) {
        let mut tasks = self.tasks();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Raise every loop flag and abort every session task.
    pub fn shutdown(&self) {
        self.coordinator.cancel_all_loops();
        for handle in self.tasks().drain(..) {
            handle.abort();
        }
    }
}

pub struct Controller {
    username: String,
    auth_password: Option<String>,
    behaviors: BehaviorConfig,
    maintenance: MaintenanceConfig,
    dispatcher: Arc<Dispatcher>,
    activity: Arc<ActivityClock>,
    audit: Arc<AuditLogger>,
    session: Mutex<Option<Arc<SessionContext>>>,
}

impl Controller {
    pub fn new(
        config: &AppConfig,
        dispatcher: Arc<Dispatcher>,
        activity: Arc<ActivityClock>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            username: config.agent.username.clone(),
            auth_password: config.agent.auth_password.clone(),
            behaviors: config.behaviors.clone(),
            maintenance: config.maintenance.clone(),
            dispatcher,
            activity,
            audit,
            session: Mutex::new(None),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<SessionContext>>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn activity(&self) -> &Arc<ActivityClock> {
        &self.activity
    }

    /// The current session, if the agent is in the world.
    pub fn session(&self) -> Option<Arc<SessionContext>> {
        self.slot().clone()
    }

    /// One-time initialization after spawn: build the session context and
    /// arm the maintenance timers.
    pub fn attach(&self, world: Arc<dyn World>) -> Arc<SessionContext> {
        let session = Arc::new(SessionContext::new(
            world.clone(),
            &self.behaviors,
            &self.maintenance,
        ));
        for handle in maintenance::spawn_session_timers(world, &self.maintenance) {
            session.track(handle.abort_handle());
        }

        if let Some(previous) = self.slot().replace(session.clone()) {
            previous.shutdown();
        }
        info!(username = %self.username, "Session attached");
        session
    }

    pub fn detach(&self) {
        let previous = self.slot().take();
        if let Some(session) = previous {
            session.shutdown();
            info!("Session detached");
        }
    }

    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Chat { username, message } => self.on_chat(username, message).await,
            SessionEvent::ServerMessage { text } => self.on_server_message(&text).await,
            SessionEvent::Health { health, food } => {
                debug!(health, food, "Health update");
                if let Some(session) = self.session() {
                    maintenance::on_health(session.world().as_ref(), &session.hunger, food).await;
                }
            }
            SessionEvent::PlayerJoined { username } => {
                self.activity.touch();
                info!(%username, "Player joined");
            }
            SessionEvent::PlayerLeft { username } => info!(%username, "Player left"),
            SessionEvent::PlayerMoved { .. } => self.activity.touch(),
            SessionEvent::GoalReached => info!("🎯 Goal reached"),
            SessionEvent::PathReset { reason } => debug!(%reason, "Path reset"),
            SessionEvent::Kicked { reason } => warn!(%reason, "Kicked"),
            SessionEvent::Error { message } => warn!(%message, "Session error"),
            SessionEvent::Login => info!(username = %self.username, "Logged in"),
            SessionEvent::Spawned | SessionEvent::Ended { .. } => {}
        }
    }

    async fn on_chat(&self, username: String, message: String) {
        let Some(session) = self.session() else {
            return;
        };
        if username == session.world().username() {
            return;
        }

        self.activity.touch();
        info!("💬 {username}: {message}");

        let Some(directive) = Directive::parse(&message) else {
            return;
        };
        if directive.runs_inline() {
            self.dispatcher.handle(&session, &username, directive).await;
            return;
        }

        let dispatcher = self.dispatcher.clone();
        let task_session = session.clone();
        let handle = tokio::spawn(async move {
            dispatcher.handle(&task_session, &username, directive).await;
        });
        session.track(handle.abort_handle());
    }

    /// Answer `/register` and `/login` prompts with the configured password.
    async fn on_server_message(&self, text: &str) {
        debug!(%text, "Server message");
        let lowered = text.to_lowercase();
        let command = if lowered.contains("/register") {
            "register"
        } else if lowered.contains("/login") {
            "login"
        } else {
            return;
        };

        let Some(password) = self.auth_password.as_deref() else {
            debug!(command, "Server asked for auth but no password is configured");
            return;
        };
        let Some(session) = self.session() else {
            return;
        };

        let line = match command {
            "register" => format!("/register {password} {password}"),
            _ => format!("/login {password}"),
        };
        let outcome = match session.world().chat(&line).await {
            Ok(()) => AuditOutcome::Success,
            Err(e) => {
                warn!(error = %e, command, "Auto-auth failed");
                AuditOutcome::Denied
            }
        };
        self.audit.log(
            AuditEvent::CredentialSent {
                command: command.into(),
            },
            &self.username,
            outcome,
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRelay;
    use crate::presence::RetryCounter;
    use crate::test_support::MockWorld;
    use craftbot_core::{EventBus, Vec3};
    use craftbot_security::AdminPolicy;
    use std::time::Duration;

    fn controller(password: Option<&str>) -> (Arc<Controller>, Arc<AuditLogger>) {
        let mut config = AppConfig::default();
        config.agent.auth_password = password.map(String::from);
        let audit = Arc::new(AuditLogger::new());
        let dispatcher = Arc::new(Dispatcher::new(
            AdminPolicy::default(),
            audit.clone(),
            Arc::new(ChatRelay::new(None, "{message}", "Aisha")),
            Arc::new(EventBus::default()),
            config.behaviors.clone(),
            Arc::new(RetryCounter::new(3)),
        ));
        let controller = Controller::new(
            &config,
            dispatcher,
            Arc::new(ActivityClock::new()),
            audit.clone(),
        );
        (Arc::new(controller), audit)
    }

    fn chat(username: &str, message: &str) -> SessionEvent {
        SessionEvent::Chat {
            username: username.into(),
            message: message.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn register_prompt_is_answered_and_audited() {
        let (controller, audit) = controller(Some("hunter2"));
        let world = Arc::new(MockWorld::new("Aisha"));
        controller.attach(world.clone());

        controller
            .handle_event(SessionEvent::ServerMessage {
                text: "Please /register <password> <password>".into(),
            })
            .await;
        controller
            .handle_event(SessionEvent::ServerMessage {
                text: "Use /LOGIN <password>".into(),
            })
            .await;

        assert_eq!(
            world.chats(),
            vec!["/register hunter2 hunter2", "/login hunter2"]
        );
        assert_eq!(audit.count(), 2);
        controller.detach();
    }

    #[tokio::test(start_paused = true)]
    async fn auth_prompt_without_password_is_skipped() {
        let (controller, audit) = controller(None);
        let world = Arc::new(MockWorld::new("Aisha"));
        controller.attach(world.clone());

        controller
            .handle_event(SessionEvent::ServerMessage {
                text: "/login".into(),
            })
            .await;
        assert!(world.chats().is_empty());
        assert_eq!(audit.count(), 0);
        controller.detach();
    }

    #[tokio::test(start_paused = true)]
    async fn own_chat_is_ignored() {
        let (controller, _) = controller(None);
        let world = Arc::new(MockWorld::new("Aisha"));
        world.add_visible_player("Aisha", 1, Vec3::default());
        controller.attach(world.clone());

        controller.handle_event(chat("Aisha", "!stop")).await;
        assert!(world.chats().is_empty());

        controller.handle_event(chat("alex", "!stop")).await;
        assert_eq!(world.chats(), vec!["Stopped current task."]);
        controller.detach();
    }

    #[tokio::test(start_paused = true)]
    async fn health_update_triggers_hunger_policy() {
        let (controller, _) = controller(None);
        let world = Arc::new(MockWorld::new("Aisha"));
        controller.attach(world.clone());

        controller
            .handle_event(SessionEvent::Health {
                health: 20.0,
                food: 8,
            })
            .await;
        assert_eq!(world.chats(), vec!["🍗 I'm hungry! Please give me some food."]);
        controller.detach();
    }

    #[tokio::test(start_paused = true)]
    async fn help_runs_off_the_event_pump() {
        let (controller, _) = controller(None);
        let world = Arc::new(MockWorld::new("Aisha"));
        controller.attach(world.clone());

        controller.handle_event(chat("alex", "!help")).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(world.chats().len(), 2);
        controller.detach();
    }

    #[tokio::test(start_paused = true)]
    async fn detach_cancels_running_loops() {
        let (controller, _) = controller(None);
        let world = Arc::new(MockWorld::new("Aisha"));
        let session = controller.attach(world);
        let flag = session.coordinator.begin_loop("wood");

        controller.detach();
        assert!(flag.is_cancelled());
        assert!(controller.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn chat_before_spawn_is_dropped() {
        let (controller, _) = controller(None);
        controller.handle_event(chat("alex", "!stop")).await;
        assert!(controller.session().is_none());
        assert!(controller.activity().idle_for() == Duration::ZERO);
    }
}
