//! Runtime configuration for the store, scheduler and logging.
//!
//! # Responsibility
//! - Provide defaults for every setting.
//! - Load overrides from a JSON file or `PLNTS_*` environment variables.
//!
//! # Invariants
//! - Missing keys fall back to defaults; unknown keys are rejected.
//! - Intervals, gates and the scan limit are strictly positive.

use crate::logging::default_log_level;
use crate::time::{Timestamp, SECOND_MS};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "PLNTS_DB_PATH";
pub const ENV_HIST_DB_PATH: &str = "PLNTS_HIST_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "PLNTS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PLNTS_LOG_DIR";
pub const ENV_SCAN_LIMIT: &str = "PLNTS_SCAN_LIMIT";

const DEFAULT_LIVE_PATH: &str = "plnts.db";
const DEFAULT_HISTORY_PATH: &str = "plnts_history.db";
const DAY_SECS: u64 = 24 * 60 * 60;
const HOUR_SECS: u64 = 60 * 60;
const DEFAULT_SCAN_LIMIT: u32 = 10_000;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    InvalidValue { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidValue { key, message } => write!(f, "invalid `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub live_path: PathBuf,
    pub history_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            live_path: PathBuf::from(DEFAULT_LIVE_PATH),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
        }
    }
}

/// Job cadence and throttling.
///
/// Intervals drive the runner's ticks; gates are the minimum time between
/// two runs of the same job as recorded on the brain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub alert_interval_secs: u64,
    pub care_event_interval_secs: u64,
    pub alert_gate_secs: u64,
    pub care_event_gate_secs: u64,
    /// Upper bound on documents loaded per collection by one job run.
    pub scan_limit: u32,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            alert_interval_secs: DAY_SECS,
            care_event_interval_secs: HOUR_SECS,
            alert_gate_secs: DAY_SECS,
            care_event_gate_secs: HOUR_SECS,
            scan_limit: DEFAULT_SCAN_LIMIT,
            run_on_start: true,
        }
    }
}

impl SchedulerConfig {
    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    pub fn care_event_interval(&self) -> Duration {
        Duration::from_secs(self.care_event_interval_secs)
    }

    pub fn alert_gate_ms(&self) -> Timestamp {
        secs_to_ms(self.alert_gate_secs)
    }

    pub fn care_event_gate_ms(&self) -> Timestamp {
        secs_to_ms(self.care_event_gate_secs)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("scheduler.alert_interval_secs", self.alert_interval_secs),
            ("scheduler.care_event_interval_secs", self.care_event_interval_secs),
            ("scheduler.alert_gate_secs", self.alert_gate_secs),
            ("scheduler.care_event_gate_secs", self.care_event_gate_secs),
            ("scheduler.scan_limit", u64::from(self.scan_limit)),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory; file logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Reads a JSON config file; absent sections take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(raw)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Builds a config from defaults overridden by `PLNTS_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_empty(ENV_DB_PATH) {
            config.store.live_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(ENV_HIST_DB_PATH) {
            config.store.history_path = PathBuf::from(path);
        }
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            config.logging.level = level.trim().to_string();
        }
        if let Some(dir) = non_empty(ENV_LOG_DIR) {
            config.logging.dir = Some(PathBuf::from(dir));
        }
        if let Some(limit) = non_empty(ENV_SCAN_LIMIT) {
            config.scheduler.scan_limit =
                limit
                    .trim()
                    .parse()
                    .map_err(|err| ConfigError::InvalidValue {
                        key: ENV_SCAN_LIMIT,
                        message: format!("`{limit}`: {err}"),
                    })?;
        }

        config.scheduler.validate()?;
        Ok(config)
    }
}

fn secs_to_ms(secs: u64) -> Timestamp {
    i64::try_from(secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(SECOND_MS)
}
