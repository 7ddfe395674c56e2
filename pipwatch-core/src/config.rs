use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, PipwatchError};

/// Prefix used by [`TimerConfig::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "PIPWATCH_";

/// Roughly one display frame at 60 Hz.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Settings for the stopwatch service and its front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub environment: Environment,
    /// Cadence of the update loop while the stopwatch runs.
    pub tick_interval: Duration,
    pub log_level: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            log_level: "info".to_string(),
        }
    }
}

impl TimerConfig {
    /// Loads configuration from the process environment (`PIPWATCH_*`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `PIPWATCH_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);
        let defaults = Self::default();

        let environment = read_var(&key("ENV"))?
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let tick_key = key("TICK_INTERVAL_MS");
        let tick_interval = match read_var(&tick_key)? {
            Some(raw) => Duration::from_millis(parse_tick_interval(&tick_key, &raw)?),
            None => defaults.tick_interval,
        };

        let log_level = read_var(&key("LOG"))?.unwrap_or(defaults.log_level);

        Ok(Self {
            environment,
            tick_interval,
            log_level,
        })
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }
}

fn read_var(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: key.to_string(),
        }),
    }
}

fn parse_tick_interval(key: &str, raw: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let millis: u64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("expected a whole number of milliseconds"))?;
    if millis == 0 {
        return Err(invalid("tick interval must be greater than zero"));
    }
    Ok(millis)
}

/// Helper that loads config and converts to the canonical pipwatch error type.
pub fn load_timer_config() -> Result<TimerConfig, PipwatchError> {
    Ok(TimerConfig::from_env()?)
}
