//! Configuration loading, validation, and management for craftbot.
//!
//! Loads configuration from `~/.craftbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.craftbot/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game server to join
    #[serde(default)]
    pub server: ServerConfig,

    /// Who the agent is and who may command it
    #[serde(default)]
    pub agent: AgentConfig,

    /// Player presence polling
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Reconnect policy
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Behavior loop tuning
    #[serde(default)]
    pub behaviors: BehaviorConfig,

    /// Periodic session maintenance
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Liveness HTTP endpoint
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generative text backend for `!chat`
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Game client bridge
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "localhost".into()
}
fn default_server_port() -> u16 {
    25565
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_username")]
    pub username: String,

    /// Identities allowed to use privileged directives. Empty = nobody.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Answer `/register` and `/login` prompts with this password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,
}

fn default_username() -> String {
    "Aisha".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            admins: vec![],
            auth_password: None,
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("username", &self.username)
            .field("admins", &self.admins)
            .field("auth_password", &redact(&self.auth_password))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Consecutive empty readings before the session is stopped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_membership_interval")]
    pub membership_interval_secs: u64,

    /// How long the retry counter stays saturated after exhaustion
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_ping_interval() -> u64 {
    30
}
fn default_membership_interval() -> u64 {
    10
}
fn default_cooldown() -> u64 {
    120
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            ping_interval_secs: default_ping_interval(),
            membership_interval_secs: default_membership_interval(),
            cooldown_secs: default_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_retries")]
    pub max_reconnects: u32,

    /// Flat delay between reconnect attempts
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_secs: u64,
}

fn default_reconnect_backoff() -> u64 {
    5
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_reconnects: default_max_retries(),
            reconnect_backoff_secs: default_reconnect_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_wood_target")]
    pub wood_target: u32,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Delay after a scan found nothing
    #[serde(default = "default_idle_retry_ms")]
    pub idle_retry_ms: u64,

    #[serde(default = "default_scan_radius")]
    pub scan_radius: u32,

    #[serde(default = "default_scan_count")]
    pub scan_count: usize,

    /// Consecutive unusable candidates before roaming away
    #[serde(default = "default_max_skip")]
    pub max_skip: u32,

    #[serde(default = "default_pickup_radius")]
    pub pickup_radius: f64,

    #[serde(default = "default_pickup_cooldown_ms")]
    pub pickup_cooldown_ms: u64,

    #[serde(default = "default_mining_radius")]
    pub mining_radius: u32,
}

fn default_wood_target() -> u32 {
    64
}
fn default_tick_ms() -> u64 {
    500
}
fn default_idle_retry_ms() -> u64 {
    1000
}
fn default_scan_radius() -> u32 {
    32
}
fn default_scan_count() -> usize {
    32
}
fn default_max_skip() -> u32 {
    10
}
fn default_pickup_radius() -> f64 {
    5.0
}
fn default_pickup_cooldown_ms() -> u64 {
    500
}
fn default_mining_radius() -> u32 {
    16
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            wood_target: default_wood_target(),
            tick_ms: default_tick_ms(),
            idle_retry_ms: default_idle_retry_ms(),
            scan_radius: default_scan_radius(),
            scan_count: default_scan_count(),
            max_skip: default_max_skip(),
            pickup_radius: default_pickup_radius(),
            pickup_cooldown_ms: default_pickup_cooldown_ms(),
            mining_radius: default_mining_radius(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_equip_interval")]
    pub equip_interval_secs: u64,

    #[serde(default = "default_jump_interval")]
    pub jump_interval_secs: u64,

    #[serde(default = "default_position_log")]
    pub position_log_secs: u64,

    /// Food level below which the agent announces hunger
    #[serde(default = "default_hunger_threshold")]
    pub hunger_threshold: u32,

    #[serde(default = "default_hunger_cooldown")]
    pub hunger_cooldown_secs: u64,

    #[serde(default = "default_idle_warn")]
    pub idle_warn_secs: u64,

    #[serde(default = "default_true")]
    pub auto_jump: bool,
}

fn default_equip_interval() -> u64 {
    300
}
fn default_jump_interval() -> u64 {
    60
}
fn default_position_log() -> u64 {
    10
}
fn default_hunger_threshold() -> u32 {
    14
}
fn default_hunger_cooldown() -> u64 {
    30
}
fn default_idle_warn() -> u64 {
    300
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            equip_interval_secs: default_equip_interval(),
            jump_interval_secs: default_jump_interval(),
            position_log_secs: default_position_log(),
            hunger_threshold: default_hunger_threshold(),
            hunger_cooldown_secs: default_hunger_cooldown(),
            idle_warn_secs: default_idle_warn(),
            auto_jump: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_gateway_port() -> u16 {
    3000
}
fn default_gateway_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            enabled: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// "gemini", "openai", "openrouter" or "ollama"
    #[serde(default = "default_generator_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_generator_model")]
    pub model: String,

    /// Persona prompt. `{name}` and `{message}` are substituted.
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_generator_provider() -> String {
    "gemini".into()
}
fn default_generator_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_persona() -> String {
    "You are {name}, a player living inside a Minecraft world.\n\
     Rules:\n\
     - Reply in one short, friendly sentence with a little attitude.\n\
     - Use emojis often.\n\
     - Never say you are an AI model and never repeat the player's name.\n\
     - If you want to act, put exactly one <action:...> tag at the very end.\n\
     \n\
     Player message: {message}"
        .into()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_generator_provider(),
            api_key: None,
            api_url: None,
            model: default_generator_model(),
            persona: default_persona(),
        }
    }
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Address of the game client bridge (newline-delimited JSON over TCP)
    #[serde(default = "default_bridge_addr")]
    pub addr: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bridge_addr() -> String {
    "127.0.0.1:4560".into()
}
fn default_request_timeout() -> u64 {
    300
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            addr: default_bridge_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.craftbot/config.toml),
    /// then apply process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (highest priority).
    ///
    /// - `SERVER_HOST`, `SERVER_PORT`, `BOT_USERNAME`
    /// - `OWNER_USERNAME` — appended to the admin list
    /// - `CRAFTBOT_API_KEY`, then `GEMINI_API_KEY`
    /// - `PORT` — gateway port
    /// - `CRAFTBOT_BRIDGE_ADDR`, `BOT_AUTH_PASSWORD`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(username) = lookup("BOT_USERNAME") {
            self.agent.username = username;
        }
        if let Some(owner) = lookup("OWNER_USERNAME")
            && !owner.is_empty()
            && !self.agent.admins.contains(&owner)
        {
            self.agent.admins.push(owner);
        }
        if let Some(key) = lookup("CRAFTBOT_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.generator.api_key = Some(key);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(addr) = lookup("CRAFTBOT_BRIDGE_ADDR") {
            self.bridge.addr = addr;
        }
        if let Some(password) = lookup("BOT_AUTH_PASSWORD") {
            self.agent.auth_password = Some(password);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".craftbot")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.username.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.username must not be empty".into(),
            ));
        }

        if self.presence.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "presence.max_retries must be > 0".into(),
            ));
        }

        if self.presence.ping_interval_secs == 0 || self.presence.membership_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "presence intervals must be > 0".into(),
            ));
        }

        if self.behaviors.tick_ms == 0 || self.behaviors.max_skip == 0 {
            return Err(ConfigError::ValidationError(
                "behaviors.tick_ms and behaviors.max_skip must be > 0".into(),
            ));
        }

        let m = &self.maintenance;
        for (name, secs) in [
            ("equip_interval_secs", m.equip_interval_secs),
            ("jump_interval_secs", m.jump_interval_secs),
            ("position_log_secs", m.position_log_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "maintenance.{name} must be > 0"
                )));
            }
        }

        Ok(())
    }

    /// Check if a generator credential is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.generator.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            agent: AgentConfig::default(),
            presence: PresenceConfig::default(),
            supervisor: SupervisorConfig::default(),
            behaviors: BehaviorConfig::default(),
            maintenance: MaintenanceConfig::default(),
            gateway: GatewayConfig::default(),
            generator: GeneratorConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
