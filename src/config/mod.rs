use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Environment variable prefix used by [`Config::from_env`]
pub const DEFAULT_ENV_PREFIX: &str = "ORCHESTRION";

/// Application launch configuration
///
/// A zero timeout means "no deadline" for that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on running every constructor
    #[serde(rename = "init_timeout_ms", with = "millis")]
    pub init_timeout: Duration,

    /// Upper bound on closing every service and resource
    #[serde(rename = "termination_timeout_ms", with = "millis")]
    pub termination_timeout: Duration,

    /// Log the stack trace alongside a recovered service panic
    pub enable_debug_stack: bool,
}

impl Config {
    /// Parse a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read `ORCHESTRION_*` environment variables, keeping defaults for unset ones
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Read `{prefix}_INIT_TIMEOUT_MS`, `{prefix}_TERMINATION_TIMEOUT_MS` and
    /// `{prefix}_ENABLE_DEBUG_STACK`
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let key = format!("{}_INIT_TIMEOUT_MS", prefix);
        if let Some(value) = lookup(&key) {
            config.init_timeout = parse_millis(&key, &value)?;
        }

        let key = format!("{}_TERMINATION_TIMEOUT_MS", prefix);
        if let Some(value) = lookup(&key) {
            config.termination_timeout = parse_millis(&key, &value)?;
        }

        let key = format!("{}_ENABLE_DEBUG_STACK", prefix);
        if let Some(value) = lookup(&key) {
            config.enable_debug_stack = parse_flag(&key, &value)?;
        }

        Ok(config)
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    pub fn with_debug_stack(mut self, enabled: bool) -> Self {
        self.enable_debug_stack = enabled;
        self
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::invalid_config(key, e.to_string()))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::invalid_config(
            key,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
