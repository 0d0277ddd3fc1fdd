//! Environment variable overrides.
//!
//! `AIGENT_*` variables take precedence over every config file.

use crate::error::ConfigError;
use std::path::PathBuf;

use super::Config;

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty(env_lookup, "AIGENT_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(dir) = non_empty(env_lookup, "AIGENT_STATE_DIR") {
        config.session.state_dir = PathBuf::from(dir);
    }
    if let Some(timeout) = non_empty(env_lookup, "AIGENT_CONNECT_TIMEOUT_SECS") {
        config.network.connect_timeout_secs =
            parse_secs("AIGENT_CONNECT_TIMEOUT_SECS", &timeout)?;
    }
    if let Some(timeout) = non_empty(env_lookup, "AIGENT_STREAM_IDLE_TIMEOUT_SECS") {
        config.network.stream_idle_timeout_secs =
            parse_secs("AIGENT_STREAM_IDLE_TIMEOUT_SECS", &timeout)?;
    }
    Ok(())
}

fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_secs(name: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid {name} value `{raw}`: expected non-negative integer seconds"
        ))
    })
}
