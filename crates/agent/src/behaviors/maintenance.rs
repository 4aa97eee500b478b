//! Session upkeep: hunger, gear, auto-jump, position log and the idle
//! watchdog.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use craftbot_config::MaintenanceConfig;
use craftbot_core::World;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::classify;
use crate::gear;

const JUMP_HOLD: Duration = Duration::from_millis(500);
const IDLE_CHECK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HungerAction {
    Eat,
    AskForFood,
}

/// Announces hunger at most once per cooldown, whichever action is taken.
#[derive(Debug)]
pub struct HungerPolicy {
    threshold: u32,
    cooldown: Duration,
    last: Option<Instant>,
}

impl HungerPolicy {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            last: None,
        }
    }

    pub fn from_config(config: &MaintenanceConfig) -> Self {
        Self::new(
            config.hunger_threshold,
            Duration::from_secs(config.hunger_cooldown_secs),
        )
    }

    pub fn evaluate(&mut self, food: u32, has_food: bool, now: Instant) -> Option<HungerAction> {
        if food >= self.threshold {
            return None;
        }
        if let Some(last) = self.last {
            if now.duration_since(last) < self.cooldown {
                return None;
            }
        }
        self.last = Some(now);
        Some(if has_food {
            HungerAction::Eat
        } else {
            HungerAction::AskForFood
        })
    }
}

/// React to a food level update.
pub async fn on_health(
    world: &dyn World,
    policy: &Mutex<HungerPolicy>,
    food: u32,
) -> Option<HungerAction> {
    let items = match world.inventory().await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Cannot read inventory for food");
            return None;
        }
    };
    let meal = classify::best_food(&items).cloned();

    let action = policy
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .evaluate(food, meal.is_some(), Instant::now())?;

    let result = match (action, meal) {
        (HungerAction::Eat, Some(meal)) => {
            info!(food, item = %meal.name, "Eating");
            match world.chat("🍗 I'm hungry! Eating now.").await {
                Ok(()) => world.consume(&meal).await,
                Err(e) => Err(e),
            }
        }
        _ => {
            info!(food, "Hungry with nothing to eat");
            world.chat("🍗 I'm hungry! Please give me some food.").await
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "Hunger handling failed");
    }
    Some(action)
}

/// Time of the last player-driven activity, shared process-wide.
#[derive(Debug)]
pub struct ActivityClock {
    last: Mutex<Instant>,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// A zero period disables the timer.
fn period(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn delayed_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Arm the per-session timers. The caller aborts the handles when the
/// session ends.
pub fn spawn_session_timers(world: Arc<dyn World>, config: &MaintenanceConfig) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // Gear: once right away, then periodically.
    let gear_world = world.clone();
    let mut gear_interval = period(config.equip_interval_secs).map(tokio::time::interval);
    if let Some(interval) = gear_interval.as_mut() {
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    }
    handles.push(tokio::spawn(async move {
        let equipped = gear::equip_best_gear(gear_world.as_ref()).await;
        debug!(equipped, "Gear check");
        let Some(mut interval) = gear_interval else {
            return;
        };
        interval.tick().await;
        loop {
            interval.tick().await;
            let equipped = gear::equip_best_gear(gear_world.as_ref()).await;
            debug!(equipped, "Gear check");
        }
    }));

    if let Some(mut interval) = period(config.jump_interval_secs)
        .filter(|_| config.auto_jump)
        .map(delayed_interval)
    {
        let jump_world = world.clone();
        handles.push(tokio::spawn(async move {
            loop {
                interval.tick().await;
                if !jump_world.on_ground().await.unwrap_or(false) {
                    continue;
                }
                if let Err(e) = jump_world.set_jump(true).await {
                    debug!(error = %e, "Jump failed");
                    continue;
                }
                tokio::time::sleep(JUMP_HOLD).await;
                if let Err(e) = jump_world.set_jump(false).await {
                    debug!(error = %e, "Jump release failed");
                }
            }
        }));
    }

    if let Some(mut interval) = period(config.position_log_secs).map(delayed_interval) {
        handles.push(tokio::spawn(async move {
            loop {
                interval.tick().await;
                match world.position().await {
                    Ok(pos) => info!(%pos, "Position"),
                    Err(e) => debug!(error = %e, "Position unavailable"),
                }
            }
        }));
    }

    handles
}

/// Log a notice whenever nothing happened for longer than `idle_warn`.
pub fn spawn_idle_watchdog(activity: Arc<ActivityClock>, idle_warn: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = delayed_interval(IDLE_CHECK);
        loop {
            interval.tick().await;
            let idle = activity.idle_for();
            if idle > idle_warn {
                info!(idle_secs = idle.as_secs(), "No activity, still waiting");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockWorld;

    #[test]
    fn cooldown_covers_both_announcements() {
        let mut policy = HungerPolicy::new(14, Duration::from_secs(30));
        let t0 = Instant::now();

        assert_eq!(policy.evaluate(20, true, t0), None);
        assert_eq!(policy.evaluate(10, false, t0), Some(HungerAction::AskForFood));
        // Food arrived, but the cooldown still holds.
        assert_eq!(policy.evaluate(10, true, t0 + Duration::from_secs(10)), None);
        assert_eq!(
            policy.evaluate(10, true, t0 + Duration::from_secs(30)),
            Some(HungerAction::Eat)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hungry_agent_eats_best_food() {
        let world = MockWorld::new("Aisha");
        world.give("apple", 2);
        world.give("cooked_beef", 1);
        let policy = Mutex::new(HungerPolicy::new(14, Duration::from_secs(30)));

        assert_eq!(on_health(&world, &policy, 6).await, Some(HungerAction::Eat));
        assert_eq!(world.chats(), vec!["🍗 I'm hungry! Eating now."]);
        assert_eq!(world.calls_with_prefix("consume"), vec!["consume:cooked_beef"]);

        assert_eq!(on_health(&world, &policy, 5).await, None);
        assert_eq!(world.chats().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn session_timers_fire_on_schedule() {
        let world = Arc::new(MockWorld::new("Aisha"));
        world.give("iron_chestplate", 1);
        let handles = spawn_session_timers(world.clone(), &MaintenanceConfig::default());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(world.calls_with_prefix("equip"), vec!["equip:iron_chestplate:Torso"]);
        assert!(world.calls_with_prefix("set_jump").is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            world.calls_with_prefix("set_jump"),
            vec!["set_jump:true", "set_jump:false"]
        );

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_periods_disable_timers() {
        let world = Arc::new(MockWorld::new("Aisha"));
        world.give("iron_chestplate", 1);
        let config = MaintenanceConfig {
            equip_interval_secs: 0,
            jump_interval_secs: 0,
            position_log_secs: 0,
            ..MaintenanceConfig::default()
        };
        let handles = spawn_session_timers(world.clone(), &config);

        // Only the one-shot gear check runs.
        assert_eq!(handles.len(), 1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(world.calls_with_prefix("equip"), vec!["equip:iron_chestplate:Torso"]);
        assert!(world.calls_with_prefix("set_jump").is_empty());

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn activity_clock_measures_idle_time() {
        let clock = ActivityClock::new();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.idle_for(), Duration::from_secs(90));
        clock.touch();
        assert_eq!(clock.idle_for(), Duration::ZERO);
    }
}
