//! Configuration System
//!
//! Loads settings from a TOML file with environment variable overrides.
//! Every field has a default, so an empty or missing file is valid.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub mcp: McpConfig,
}

/// Which store sits behind the dispatch layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Append-only journal under `data_dir`
    Journal,
    /// Process-local, lost on exit
    Memory,
    /// Reports the store as unavailable on this platform
    Unavailable,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "journal" => Some(Self::Journal),
            "memory" => Some(Self::Memory),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Journal => "journal",
            Self::Memory => "memory",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Journal durability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// fsync after every appended entry
    EveryWrite,
    /// Flush to the OS only
    None,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_sync")]
    pub sync: SyncMode,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Journal
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("healthbridge").to_string_lossy().to_string())
        .unwrap_or_else(|| "./healthbridge_data".to_string())
}

fn default_sync() -> SyncMode {
    SyncMode::EveryWrite
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            sync: default_sync(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Tool server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,

    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

fn default_server_name() -> String {
    "healthbridge".to_string()
}

fn default_max_concurrent_calls() -> usize {
    8
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve the configuration the binary runs with.
    ///
    /// An explicit path must load. Otherwise the default locations are tried
    /// in order; broken files are skipped and handed back so the caller can
    /// report them once logging is up.
    pub fn load_default(
        explicit: Option<&Path>,
    ) -> Result<(Self, Vec<ConfigError>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_with_env(path)?, Vec::new()));
        }

        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("healthbridge").join("config.toml")),
            Some(PathBuf::from("./healthbridge.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(Self::load_first(&config_paths))
    }

    /// First candidate that exists and parses, with the ones that failed
    fn load_first(candidates: &[PathBuf]) -> (Self, Vec<ConfigError>) {
        let mut skipped = Vec::new();
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => return (config, skipped),
                Err(e) => skipped.push(e),
            }
        }
        (Self::from_env(), skipped)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("HEALTHBRIDGE_STORE_BACKEND") {
            match StoreBackend::parse(&backend) {
                Some(b) => self.store.backend = b,
                None => tracing::warn!("Ignoring unknown store backend '{}'", backend),
            }
        }
        if let Some(data_dir) = lookup("HEALTHBRIDGE_DATA_DIR") {
            self.store.data_dir = data_dir;
        }

        if let Some(level) = lookup("HEALTHBRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("HEALTHBRIDGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# HealthBridge Configuration
#
# Place this file at ~/.config/healthbridge/config.toml
# or pass it with --config <path>.
# Environment variables override file values:
#   HEALTHBRIDGE_STORE_BACKEND, HEALTHBRIDGE_DATA_DIR,
#   HEALTHBRIDGE_LOG_LEVEL, HEALTHBRIDGE_LOG_FORMAT

[store]
# Backend: journal, memory or unavailable
backend = "journal"

# Directory holding journal.log
# data_dir = "~/.local/share/healthbridge"

# Journal durability: every_write or none
sync = "every_write"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty or json (always written to stderr)
format = "pretty"

[mcp]
# Name announced during initialize
server_name = "healthbridge"

# Upper bound on tool calls running at once
max_concurrent_calls = 8
"#
    .to_string()
}
