//! Command Dispatcher — chat text to directives to actions.
//!
//! Directives are `!`-prefixed and case-insensitive. Anything that does not
//! parse (unknown head, missing or non-numeric arguments) is ignored
//! silently. Privileged directives go through the admin allowlist first; a
//! rejected attempt only produces the rejection message.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use craftbot_config::BehaviorConfig;
use craftbot_core::{
    ActionError, BlockPos, DomainEvent, EventBus, GeneratorError, Goal, World,
};
use craftbot_security::{AdminPolicy, AuditEvent, AuditLogger, AuditOutcome};
use tracing::{debug, info, warn};

use crate::actions::{self, DeliverOutcome, PlayerLocation};
use crate::behaviors::{self, BehaviorContext, MiningLoop, WoodCollection};
use crate::chat::ChatRelay;
use crate::controller::SessionContext;
use crate::coordinator::GoalMode;
use crate::presence::RetryCounter;

const HELP_PAGES: [&str; 2] = [
    "📜 Commands 1/2: !come | !follow | !avoid | !stop | !collect wood | !put in chest | !getlocation <username> | !copypos",
    "📜 Commands 2/2: !goto x y z | !break | !place <item> | !deliver | !startmine | !stopmine | !chat <msg>",
];

const ADMIN_HELP_PAGES: [&str; 2] = [
    "👑 Admin Commands 1/2: !status (session, presence retries, running tasks)",
    "👑 Admin Commands 2/2: !adminhelp",
];

const PERMISSION_DENIED: &str = "🚫 You don't have permission to use this command.";

const FOLLOW_RANGE: f64 = 3.0;
const AVOID_RANGE: f64 = 5.0;

/// Target of `!goto`, selected by argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoTarget {
    Point(BlockPos),
    Column { x: i32, z: i32 },
    Level(i32),
}

impl GotoTarget {
    fn parse(args: &[&str]) -> Option<Self> {
        let nums = args
            .iter()
            .map(|a| a.parse::<i32>().ok())
            .collect::<Option<Vec<_>>>()?;
        match nums.as_slice() {
            [x, y, z] => Some(GotoTarget::Point(BlockPos::new(*x, *y, *z))),
            [x, z] => Some(GotoTarget::Column { x: *x, z: *z }),
            [y] => Some(GotoTarget::Level(*y)),
            _ => None,
        }
    }

    pub fn goal(&self) -> Goal {
        match *self {
            GotoTarget::Point(pos) => Goal::Block { pos },
            GotoTarget::Column { x, z } => Goal::Xz { x, z },
            GotoTarget::Level(y) => Goal::Y { y },
        }
    }
}

/// A parsed user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Help,
    AdminHelp,
    Status,
    Stop,
    Come,
    Follow,
    Avoid,
    Goto(GotoTarget),
    Break,
    Place(String),
    Deliver,
    PutInChest,
    GetLocation(String),
    CollectWood,
    CopyPos,
    StartMine,
    StopMine,
    Chat(String),
}

impl Directive {
    /// Parse one chat line. `None` for anything that is not a directive.
    pub fn parse(message: &str) -> Option<Self> {
        let body = message.trim().strip_prefix('!')?.trim();
        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        let head = head.to_lowercase();
        let args: Vec<&str> = rest.split_whitespace().collect();
        let lowered: Vec<String> = args.iter().map(|a| a.to_lowercase()).collect();

        let directive = match head.as_str() {
            "help" => Directive::Help,
            "adminhelp" => Directive::AdminHelp,
            "status" => Directive::Status,
            "stop" => Directive::Stop,
            "come" => Directive::Come,
            "follow" => Directive::Follow,
            "avoid" => Directive::Avoid,
            "goto" => Directive::Goto(GotoTarget::parse(&args)?),
            "break" => Directive::Break,
            "place" => Directive::Place(lowered.first()?.clone()),
            "deliver" => Directive::Deliver,
            "put" if lowered == ["in", "chest"] => Directive::PutInChest,
            // Usernames are case-sensitive.
            "getlocation" => Directive::GetLocation(args.first()?.to_string()),
            "collect" if lowered == ["some", "wood"] || lowered == ["wood"] => {
                Directive::CollectWood
            }
            "copypos" => Directive::CopyPos,
            "startmine" => Directive::StartMine,
            "stopmine" => Directive::StopMine,
            "chat" if !rest.is_empty() => Directive::Chat(rest.to_string()),
            _ => return None,
        };
        Some(directive)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Directive::Help => "help",
            Directive::AdminHelp => "adminhelp",
            Directive::Status => "status",
            Directive::Stop => "stop",
            Directive::Come => "come",
            Directive::Follow => "follow",
            Directive::Avoid => "avoid",
            Directive::Goto(_) => "goto",
            Directive::Break => "break",
            Directive::Place(_) => "place",
            Directive::Deliver => "deliver",
            Directive::PutInChest => "put in chest",
            Directive::GetLocation(_) => "getlocation",
            Directive::CollectWood => "collect wood",
            Directive::CopyPos => "copypos",
            Directive::StartMine => "startmine",
            Directive::StopMine => "stopmine",
            Directive::Chat(_) => "chat",
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Directive::AdminHelp | Directive::Status)
    }

    /// Whether the directive finishes without waiting on navigation or a
    /// remote call, so the event pump can run it in place.
    pub fn runs_inline(&self) -> bool {
        matches!(
            self,
            Directive::Status
                | Directive::Stop
                | Directive::Come
                | Directive::Follow
                | Directive::Avoid
                | Directive::Goto(_)
                | Directive::GetLocation(_)
                | Directive::CollectWood
                | Directive::StartMine
                | Directive::StopMine
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a directive.
    Ignored,
    /// Privileged directive from a non-admin.
    Rejected,
    Handled,
}

pub struct Dispatcher {
    admins: AdminPolicy,
    audit: Arc<AuditLogger>,
    chat: Arc<ChatRelay>,
    events: Arc<EventBus>,
    behaviors: BehaviorConfig,
    presence: Arc<RetryCounter>,
    help_delay: Duration,
}

impl Dispatcher {
    pub fn new(
        admins: AdminPolicy,
        audit: Arc<AuditLogger>,
        chat: Arc<ChatRelay>,
        events: Arc<EventBus>,
        behaviors: BehaviorConfig,
        presence: Arc<RetryCounter>,
    ) -> Self {
        Self {
            admins,
            audit,
            chat,
            events,
            behaviors,
            presence,
            help_delay: Duration::from_secs(1),
        }
    }

    /// Parse and handle in one step.
    pub async fn dispatch(
        &self,
        session: &SessionContext,
        username: &str,
        message: &str,
    ) -> DispatchOutcome {
        match Directive::parse(message) {
            Some(directive) => self.handle(session, username, directive).await,
            None => DispatchOutcome::Ignored,
        }
    }

    pub async fn handle(
        &self,
        session: &SessionContext,
        username: &str,
        directive: Directive,
    ) -> DispatchOutcome {
        let name = directive.name();

        if directive.is_privileged() {
            let event = AuditEvent::PrivilegedDirective {
                directive: name.into(),
            };
            if !self.admins.check(username).is_allowed() {
                self.audit
                    .log(event, username, AuditOutcome::Denied, None);
                say(session.world(), PERMISSION_DENIED).await;
                self.publish(username, name, false);
                return DispatchOutcome::Rejected;
            }
            self.audit.log(event, username, AuditOutcome::Success, None);
        }

        info!(username, directive = name, "Handling directive");
        self.run(session, username, directive).await;
        self.publish(username, name, true);
        DispatchOutcome::Handled
    }

    fn publish(&self, username: &str, directive: &str, accepted: bool) {
        self.events.publish(DomainEvent::DirectiveHandled {
            username: username.into(),
            directive: directive.into(),
            accepted,
            timestamp: Utc::now(),
        });
    }

    async fn run(&self, session: &SessionContext, username: &str, directive: Directive) {
        let world = session.world();
        let coordinator = &session.coordinator;

        match directive {
            Directive::Help => self.pages(world, &HELP_PAGES).await,
            Directive::AdminHelp => self.pages(world, &ADMIN_HELP_PAGES).await,
            Directive::Status => {
                let loops = coordinator.running_loops();
                let goal = coordinator.current_goal().await;
                let text = format!(
                    "📊 Presence retries {}/{} | tasks: {} | goal: {}",
                    self.presence.value(),
                    self.presence.max(),
                    if loops.is_empty() {
                        "none".to_string()
                    } else {
                        loops.join(", ")
                    },
                    goal.map(|g| g.goal.label()).unwrap_or("none"),
                );
                say(world, &text).await;
            }
            Directive::Stop => {
                coordinator.stop_all().await;
                say(world, "Stopped current task.").await;
            }
            Directive::Come => {
                let Some(target) = requester(world, username).await else {
                    return say(world, "I don't see you!").await;
                };
                coordinator
                    .set_goal(Goal::near(target.position, 1.0), GoalMode::Exclusive)
                    .await;
            }
            Directive::Follow => {
                let Some(target) = requester(world, username).await else {
                    return say(world, "I don't see you!").await;
                };
                let goal = Goal::Follow {
                    entity_id: target.id,
                    range: FOLLOW_RANGE,
                };
                coordinator.set_goal(goal, GoalMode::Persistent).await;
            }
            Directive::Avoid => {
                let Some(target) = requester(world, username).await else {
                    return say(world, "I don't see you!").await;
                };
                let goal = Goal::invert(Goal::Follow {
                    entity_id: target.id,
                    range: AVOID_RANGE,
                });
                coordinator.set_goal(goal, GoalMode::Persistent).await;
            }
            Directive::Goto(target) => {
                coordinator.set_goal(target.goal(), GoalMode::Exclusive).await;
            }
            Directive::Break => {
                let Some(viewer) = requester(world, username).await else {
                    return say(world, "I can't see you!").await;
                };
                match actions::break_in_sight(coordinator, &viewer).await {
                    Ok(()) => {}
                    Err(ActionError::OutOfReach) => say(world, "Block is out of reach").await,
                    Err(e) => warn!(error = %e, "Break failed"),
                }
            }
            Directive::Place(item) => {
                let Some(viewer) = requester(world, username).await else {
                    return say(world, "I can't see you!").await;
                };
                match actions::place_in_sight(coordinator, &viewer, &item).await {
                    Ok(()) => {}
                    Err(ActionError::NotFound(_)) => {
                        say(world, &format!("I don't have {item}")).await
                    }
                    Err(ActionError::OutOfReach) => say(world, "Block is out of reach").await,
                    Err(e) => warn!(error = %e, "Place failed"),
                }
            }
            Directive::Deliver => {
                let text = match actions::deliver_to_trapped_chest(coordinator).await {
                    Ok(DeliverOutcome::NoChest) => "No trapped chest nearby.",
                    Ok(DeliverOutcome::Empty) => "Nothing to deliver!",
                    Ok(DeliverOutcome::Delivered(stacks)) => {
                        debug!(stacks, "Delivered");
                        "All deliverable items placed in trapped chest."
                    }
                    Err(e) => {
                        warn!(error = %e, "Delivery failed");
                        "Failed to deliver items."
                    }
                };
                say(world, text).await;
            }
            Directive::PutInChest => match actions::deposit_logs(coordinator).await {
                Ok(None) => say(world, "❌ No chest nearby.").await,
                Ok(Some(logs)) => {
                    debug!(logs, "Deposited logs");
                    say(world, "📦 Logs deposited.").await;
                }
                Err(e) => warn!(error = %e, "Deposit failed"),
            },
            Directive::GetLocation(name) => {
                let text = match actions::locate_player(world.as_ref(), &name).await {
                    Ok(PlayerLocation::Offline) => format!(
                        "❌ I can't find any data for player \"{name}\". They might be offline."
                    ),
                    Ok(PlayerLocation::OutOfView) => format!(
                        "👀 {name} is online but not currently in view. I can't track their exact location."
                    ),
                    Ok(PlayerLocation::At { pos, dimension }) => {
                        let block = pos.floored();
                        format!(
                            "📍 {name} is at X: {}, Y: {}, Z: {} in world: {dimension}",
                            block.x, block.y, block.z
                        )
                    }
                    Err(e) => {
                        warn!(error = %e, "Location lookup failed");
                        return;
                    }
                };
                say(world, &text).await;
            }
            Directive::CollectWood => match actions::equip_axe(world.as_ref()).await {
                Ok(Some(axe)) => {
                    info!(%axe, "Starting wood collection");
                    say(world, "🪓 Starting wood collection...").await;
                    let wood =
                        WoodCollection::new(self.behaviors.wood_target, self.behaviors.max_skip);
                    self.start_loop(session, WoodCollection::NAME, wood);
                }
                Ok(None) => say(world, "🪓 I need at least a stone axe to start chopping.").await,
                Err(e) => warn!(error = %e, "Could not equip axe"),
            },
            Directive::CopyPos => {
                let Some(target) = requester(world, username).await else {
                    return say(world, &format!("❗ Player {username} not found.")).await;
                };
                match actions::copy_position(coordinator, &target).await {
                    Ok(()) => {
                        say(
                            world,
                            &format!("📍 Positioned at {username}'s location, facing their direction."),
                        )
                        .await
                    }
                    Err(e) => debug!(error = %e, "Copy position failed"),
                }
            }
            Directive::StartMine => match actions::equip_pickaxe(world.as_ref()).await {
                Ok(Some(_)) => {
                    say(world, "⛏️ Starting to mine...").await;
                    self.start_loop(session, MiningLoop::NAME, MiningLoop::new());
                }
                Ok(None) => say(world, "⛏️ I need a pickaxe to start mining.").await,
                Err(e) => warn!(error = %e, "Could not equip pickaxe"),
            },
            Directive::StopMine => {
                if coordinator.cancel_loop(MiningLoop::NAME) {
                    coordinator.cancel_goal().await;
                    say(world, "⛏️ Mining stopped.").await;
                } else {
                    say(world, "⛏️ I'm not mining right now.").await;
                }
            }
            Directive::Chat(text) => match self.chat.reply(&text).await {
                Ok(reply) => say(world, &reply).await,
                Err(GeneratorError::NotConfigured(reason)) => {
                    info!(%reason, "Chat requested without a generator");
                    say(world, "❌ Chat is not available right now.").await;
                }
                Err(e) => {
                    warn!(error = %e, "Chat generation failed");
                    say(world, "❌ I couldn't come up with a reply.").await;
                }
            },
        }
    }

    async fn pages(&self, world: &Arc<dyn World>, pages: &[&str]) {
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.help_delay).await;
            }
            say(world, page).await;
        }
    }

    fn start_loop<B: behaviors::Behavior + 'static>(
        &self,
        session: &SessionContext,
        name: &'static str,
        behavior: B,
    ) {
        let ctx = BehaviorContext::begin(
            name,
            session.coordinator.clone(),
            session.drops.clone(),
            self.behaviors.clone(),
            self.events.clone(),
        );
        let handle = behaviors::spawn(behavior, ctx);
        session.track(handle.abort_handle());
    }
}

async fn requester(world: &Arc<dyn World>, username: &str) -> Option<craftbot_core::Entity> {
    match actions::requester_entity(world.as_ref(), username).await {
        Ok(entity) => entity,
        Err(e) => {
            warn!(error = %e, "Cannot look up requester");
            None
        }
    }
}

async fn say(world: &Arc<dyn World>, text: &str) {
    if let Err(e) = world.chat(text).await {
        warn!(error = %e, "Failed to send chat");
    }
}
