//! TOML-based daemon configuration.
//!
//! Holds everything needed to assemble the task set:
//! - Tick length and log destination
//! - Activity sampling cadence and category indicators
//! - Connectivity probe and HTTP client settings
//! - Per-daemon sections under `[daemons.*]`
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::activity::{
    default_indicators, validate_threshold, ActivityClassifier, ActivityIndicators,
    CategorySelector, ContextSource, IdleSource, DEFAULT_RETENTION_MINUTES,
    DEFAULT_SAMPLE_INTERVAL_SECS,
};
use crate::daemons::{
    DailyBackupConfig, MovieLightingConfig, PublicIpConfig, VocabImportConfig, WordListConfig,
};
use crate::error::{ConfigError, CoreError};
use crate::net::{DEFAULT_PROBE_HOST, DEFAULT_PROBE_PORT};

/// Where task log lines go besides `tracing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also append lines to per-day, per-task files.
    #[serde(default = "default_true")]
    pub to_file: bool,
    /// Defaults to `<data_dir>/log`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Activity sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: u64,
    /// Category name to window-title substrings.
    #[serde(default = "default_indicators")]
    pub categories: ActivityIndicators,
}

/// Internet reachability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,
    #[serde(default = "default_probe_port")]
    pub port: u16,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
    /// How long a probe answer is reused.
    #[serde(default = "default_probe_cache")]
    pub cache_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonsConfig {
    #[serde(default)]
    pub public_ip: PublicIpConfig,
    #[serde(default)]
    pub movie_lighting: MovieLightingConfig,
    #[serde(default)]
    pub word_list: WordListConfig,
    #[serde(default)]
    pub vocab_import: VocabImportConfig,
    #[serde(default)]
    pub daily_backup: DailyBackupConfig,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub daemons: DaemonsConfig,
}

fn default_true() -> bool {
    true
}
fn default_tick_secs() -> u64 {
    1
}
fn default_sample_interval() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_SECS
}
fn default_retention_minutes() -> u64 {
    DEFAULT_RETENTION_MINUTES
}
fn default_probe_host() -> String {
    DEFAULT_PROBE_HOST.into()
}
fn default_probe_port() -> u16 {
    DEFAULT_PROBE_PORT
}
fn default_probe_timeout() -> u64 {
    3
}
fn default_probe_cache() -> u64 {
    1
}
fn default_http_timeout() -> u64 {
    10
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            to_file: true,
            dir: None,
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval(),
            retention_minutes: default_retention_minutes(),
            categories: default_indicators(),
        }
    }
}

impl ActivityConfig {
    /// Classifier over the given sources with this section's cadence and
    /// indicators.
    pub fn classifier(
        &self,
        source: impl ContextSource + 'static,
        idle: impl IdleSource + 'static,
    ) -> ActivityClassifier {
        ActivityClassifier::new(source, idle)
            .with_indicators(self.categories.clone())
            .with_sampling(self.sample_interval_secs, self.retention_minutes * 60)
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            timeout_secs: default_probe_timeout(),
            cache_secs: default_probe_cache(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            logging: LoggingConfig::default(),
            activity: ActivityConfig::default(),
            connectivity: ConnectivityConfig::default(),
            http: HttpConfig::default(),
            daemons: DaemonsConfig::default(),
        }
    }
}

fn require_positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "must be greater than zero".into(),
        });
    }
    Ok(())
}

fn require_set(key: &str, missing: bool) -> Result<(), ConfigError> {
    if missing {
        return Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "required when the daemon is enabled".into(),
        });
    }
    Ok(())
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`
    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        Ok(Self::load_from(&Self::path()?)?)
    }

    /// Load from `path`, writing defaults there if the file is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), CoreError> {
        Ok(self.save_to(&Self::path()?)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type.
    pub fn update(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Update a value by key and persist to the default location.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.update(key, value)?;
        self.validate()?;
        self.save()
    }

    /// Directory for per-task log files.
    pub fn log_dir(&self) -> Result<PathBuf, CoreError> {
        match &self.logging.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(data_dir()?.join("log")),
        }
    }

    /// Reject settings that would make the daemon misbehave.
    ///
    /// Runs before any task is built, so a typo in a category name stops
    /// startup instead of surfacing on the first evaluation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("tick_secs", self.tick_secs)?;
        require_positive("activity.sample_interval_secs", self.activity.sample_interval_secs)?;
        require_positive("activity.retention_minutes", self.activity.retention_minutes)?;
        require_positive("http.timeout_secs", self.http.timeout_secs)?;
        require_positive("connectivity.timeout_secs", self.connectivity.timeout_secs)?;

        let d = &self.daemons;
        if d.public_ip.enabled {
            require_positive("daemons.public_ip.interval_secs", d.public_ip.interval_secs)?;
        }
        if d.movie_lighting.enabled {
            let m = &d.movie_lighting;
            require_positive("daemons.movie_lighting.interval_secs", m.interval_secs)?;
            CategorySelector::parse(&self.activity.categories, &m.categories)?;
            validate_threshold(m.threshold_percent)?;
        }
        if d.word_list.enabled {
            require_positive("daemons.word_list.interval_secs", d.word_list.interval_secs)?;
            require_set("daemons.word_list.url", d.word_list.url.is_empty())?;
        }
        if d.vocab_import.enabled {
            require_positive("daemons.vocab_import.interval_secs", d.vocab_import.interval_secs)?;
            require_set(
                "daemons.vocab_import.database",
                d.vocab_import.database.as_os_str().is_empty(),
            )?;
        }
        if d.daily_backup.enabled {
            let b = &d.daily_backup;
            require_positive("daemons.daily_backup.interval_secs", b.interval_secs)?;
            require_set("daemons.daily_backup.source", b.source.as_os_str().is_empty())?;
            require_set(
                "daemons.daily_backup.destination_dir",
                b.destination_dir.as_os_str().is_empty(),
            )?;
        }
        Ok(())
    }
}
