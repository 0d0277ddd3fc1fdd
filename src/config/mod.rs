//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`AIGENT_BASE_URL`, `AIGENT_STATE_DIR`,
//!    `AIGENT_CONNECT_TIMEOUT_SECS`, `AIGENT_STREAM_IDLE_TIMEOUT_SECS`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./aigent.toml in the current directory
//! 4. $XDG_CONFIG_HOME/aigent/aigent.toml (or ~/.config/aigent/aigent.toml)
//! 5. Built-in defaults

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

mod defaults;
mod env;
mod types;

use defaults::CONFIG_FILE_NAME;
use env::apply_runtime_env_overrides;
pub use types::{ApiConfig, Config, DisplayConfig, NetworkConfig, SessionConfig};

/// Where the effective config text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Config loaded from explicit `--config` path.
    Explicit(PathBuf),
    /// Config loaded from local `./aigent.toml`.
    Local,
    /// Config loaded from the global config root.
    Global(PathBuf),
    /// No file found; runtime defaults were used.
    BuiltInDefaults,
}

/// Values from command-line flags, applied on top of a loaded config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub no_color: bool,
}

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    let (config, source) = load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )?;
    tracing::debug!(?source, base_url = %config.api.base_url, "loaded configuration");
    Ok(config)
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<(Config, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&text)?;
    apply_runtime_env_overrides(&mut config, &env_lookup)?;
    normalize(&mut config);
    validate(&config)?;
    Ok((config, source))
}

/// Apply command-line flags, then re-check the result.
///
/// Flags outrank files and environment, so they go through the same
/// validation instead of bypassing it.
pub fn apply_cli_overrides(
    config: &mut Config,
    overrides: &CliOverrides,
) -> Result<(), ConfigError> {
    if let Some(url) = &overrides.base_url {
        config.api.base_url = url.trim().to_string();
    }
    if let Some(dir) = &overrides.state_dir {
        config.session.state_dir = dir.clone();
    }
    if overrides.no_color {
        config.display.color = false;
    }
    normalize(config);
    validate(config)
}

/// Read config text from the highest-precedence available source.
fn read_config_text<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    // An explicit path must exist; the implicit locations are best-effort.
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }
    if let Ok(text) = read_file(Path::new(CONFIG_FILE_NAME)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join("aigent").join(CONFIG_FILE_NAME);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }
    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

fn normalize(config: &mut Config) {
    // A zero connect timeout would mean "wait forever".
    config.network.connect_timeout_secs = config.network.connect_timeout_secs.max(1);
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let base_url = config.api.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Invalid(
            "api.base_url must not be empty".to_string(),
        ));
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "api.base_url `{base_url}` must start with http:// or https://"
        )));
    }
    if config.session.state_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(
            "session.state_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Root directory for global config files.
pub fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}
