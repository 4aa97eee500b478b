//! `craftbot run` — Full runtime.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use craftbot_agent::behaviors::maintenance;
use craftbot_agent::{
    ActivityClock, ChatRelay, ConnectionSupervisor, Controller, Dispatcher, PresenceMonitor,
    spawn_ping_loop,
};
use craftbot_connectors::{BridgeConnector, ConsoleCommand, ConsoleInput, SlpStatusSource};
use craftbot_core::{ConnectOptions, EventBus};
use craftbot_security::{AdminPolicy, AuditLogger, TracingSink};
use tracing::{debug, info, warn};

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🤖 craftbot — Starting");
    println!("   Server:   {}:{}", config.server.host, config.server.port);
    println!("   Username: {}", config.agent.username);
    println!("   Bridge:   {}", config.bridge.addr);
    println!("   Admins:   {}", config.agent.admins.len());
    if config.gateway.enabled {
        println!("   Gateway:  {}:{}", config.gateway.host, config.gateway.port);
    }

    let events = Arc::new(EventBus::default());
    let monitor = Arc::new(PresenceMonitor::new(
        &config.presence,
        Arc::new(SlpStatusSource::new(STATUS_TIMEOUT)),
        config.server.host.clone(),
        config.server.port,
        events.clone(),
    ));

    let audit = Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)]));
    let relay = Arc::new(ChatRelay::new(
        craftbot_providers::build_from_config(&config.generator),
        config.generator.persona.clone(),
        config.agent.username.clone(),
    ));
    println!(
        "   Chat:     {}",
        if relay.is_configured() {
            config.generator.provider.as_str()
        } else {
            "disabled"
        }
    );

    let dispatcher = Arc::new(Dispatcher::new(
        AdminPolicy::new(config.agent.admins.iter().cloned()),
        audit.clone(),
        relay,
        events.clone(),
        config.behaviors.clone(),
        monitor.counter().clone(),
    ));
    let activity = Arc::new(ActivityClock::new());
    let controller = Arc::new(Controller::new(
        &config,
        dispatcher,
        activity.clone(),
        audit,
    ));

    let connector = Arc::new(BridgeConnector::new(
        config.bridge.addr.clone(),
        Duration::from_secs(config.bridge.request_timeout_secs),
    ));
    let supervisor = Arc::new(ConnectionSupervisor::new(
        connector,
        ConnectOptions {
            host: config.server.host.clone(),
            port: config.server.port,
            username: config.agent.username.clone(),
        },
        monitor.clone(),
        controller,
        events.clone(),
        &config.supervisor,
        Duration::from_secs(config.presence.membership_interval_secs),
    ));

    if config.gateway.enabled {
        let state = Arc::new(craftbot_gateway::GatewayState::new(
            supervisor.subscribe_state(),
        ));
        let gateway = config.gateway.clone();
        tokio::spawn(async move {
            if let Err(e) = craftbot_gateway::start(&gateway, state).await {
                warn!(error = %e, "Gateway stopped");
            }
        });
    }

    spawn_event_log(&events);
    let _watchdog = maintenance::spawn_idle_watchdog(
        activity,
        Duration::from_secs(config.maintenance.idle_warn_secs),
    );
    let _ping = spawn_ping_loop(
        monitor,
        supervisor.clone(),
        Duration::from_secs(config.presence.ping_interval_secs),
    );
    info!("Runtime started");

    let mut console = ConsoleInput::start();
    let mut console_open = true;
    loop {
        tokio::select! {
            command = console.recv(), if console_open => match command {
                Some(ConsoleCommand::Quit) => break,
                Some(command) => handle_console(&supervisor, command).await,
                None => {
                    debug!("Console closed");
                    console_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down");
    supervisor.stop("Shutting down").await;
    Ok(())
}

async fn handle_console(supervisor: &ConnectionSupervisor, command: ConsoleCommand) {
    let Some(world) = supervisor.world() else {
        info!(state = %supervisor.state(), "Bot not ready yet");
        return;
    };

    let result = match command {
        ConsoleCommand::Say(text) | ConsoleCommand::Chat(text) => world.chat(&text).await,
        ConsoleCommand::Pos => world.position().await.map(|pos| {
            println!("📍 {pos}");
        }),
        ConsoleCommand::Quit => Ok(()),
    };
    if let Err(e) = result {
        warn!(error = %e, "Console command failed");
    }
}

/// Debug-log every domain event.
fn spawn_event_log(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(event = ?event, "Domain event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event log lagged")
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
