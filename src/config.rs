//! Bridge configuration
//!
//! Loaded from a JSON file. A default file is written on first start so
//! operators have something to edit.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{BridgeError, BridgeResult};
use crate::engine::ContextSet;

/// Default config file name
pub const CONFIG_FILE: &str = "perm-bridge.json";

/// Verbose audit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseConfig {
    /// Whether permission checks are recorded at startup
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Optional regex; only matching nodes are recorded
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for VerboseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files (stderr only when unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Write file logs as JSON lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// JSON file holding users' nodes
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Contexts applied to every sender
    #[serde(default)]
    pub static_contexts: ContextSet,

    /// Account ids that pass every `has_permission` gate
    #[serde(default)]
    pub trusted_users: Vec<i64>,

    /// Upper bound on a single store load, in milliseconds
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Interval of the temporary-node expiry task, in seconds
    #[serde(default = "default_expire_interval_secs")]
    pub expire_interval_secs: u64,

    /// Interval of the idle-user eviction task, in seconds
    #[serde(default = "default_cache_housekeeping_interval_secs")]
    pub cache_housekeeping_interval_secs: u64,

    #[serde(default)]
    pub verbose: VerboseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Extra debug logging from the bridge itself
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/users.json")
}

fn default_load_timeout_ms() -> u64 {
    5_000
}

fn default_expire_interval_secs() -> u64 {
    3
}

fn default_cache_housekeeping_interval_secs() -> u64 {
    120
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            static_contexts: ContextSet::new(),
            trusted_users: Vec::new(),
            load_timeout_ms: default_load_timeout_ms(),
            expire_interval_secs: default_expire_interval_secs(),
            cache_housekeeping_interval_secs: default_cache_housekeeping_interval_secs(),
            verbose: VerboseConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage file
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Add a static context pair
    pub fn with_static_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_contexts.add(key, value);
        self
    }

    /// Add a trusted account id
    pub fn with_trusted_user(mut self, id: i64) -> Self {
        self.trusted_users.push(id);
        self
    }

    /// Set the store load timeout
    pub fn with_load_timeout(mut self, timeout_ms: u64) -> Self {
        self.load_timeout_ms = timeout_ms;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn expire_interval(&self) -> Duration {
        Duration::from_secs(self.expire_interval_secs)
    }

    pub fn cache_housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.cache_housekeeping_interval_secs)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> BridgeResult<()> {
        if self.load_timeout_ms == 0 {
            return Err(BridgeError::invalid_config("load_timeout_ms must be greater than 0"));
        }
        if self.expire_interval_secs == 0 || self.cache_housekeeping_interval_secs == 0 {
            return Err(BridgeError::invalid_config(
                "housekeeping intervals must be greater than 0",
            ));
        }
        if let Some(filter) = &self.verbose.filter {
            regex::Regex::new(filter).map_err(|e| {
                BridgeError::invalid_config(format!("verbose.filter is not a valid regex: {}", e))
            })?;
        }
        Ok(())
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let config: BridgeConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> BridgeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load the config, writing the defaults first if the file is missing
    pub fn load_or_bootstrap(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {:?}, writing defaults", path);
            Self::default().save(path)?;
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.load_timeout(), Duration::from_secs(5));
        assert_eq!(config.expire_interval(), Duration::from_secs(3));
        assert_eq!(config.cache_housekeeping_interval(), Duration::from_secs(120));
        assert!(config.verbose.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .with_storage_path("/tmp/users.json")
            .with_static_context("server", "main")
            .with_trusted_user(42)
            .with_load_timeout(250);

        assert_eq!(config.storage_path, PathBuf::from("/tmp/users.json"));
        assert!(config.static_contexts.contains("server", "main"));
        assert_eq!(config.trusted_users, vec![42]);
        assert_eq!(config.load_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = BridgeConfig::new().with_load_timeout(0);
        assert!(matches!(config.validate(), Err(BridgeError::InvalidConfig(_))));

        let mut config = BridgeConfig::new();
        config.verbose.filter = Some("(".to_string());
        assert!(matches!(config.validate(), Err(BridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_bootstrap_writes_defaults_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join(CONFIG_FILE);

        let config = BridgeConfig::load_or_bootstrap(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.load_timeout_ms, 5_000);

        // Operator edits survive the next start
        let edited = config.with_trusted_user(7);
        edited.save(&path).unwrap();
        let reloaded = BridgeConfig::load_or_bootstrap(&path).unwrap();
        assert_eq!(reloaded.trusted_users, vec![7]);
    }
}
