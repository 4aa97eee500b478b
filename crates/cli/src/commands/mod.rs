pub mod config_cmd;
pub mod ping;
pub mod run;

use std::path::{Path, PathBuf};

use craftbot_config::{AppConfig, ConfigError};

pub(crate) fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load `explicit` or the default path, with environment overrides.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_path(explicit))
}
