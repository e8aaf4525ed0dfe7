//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. the CLI's `--config <path>`)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Every section and field is optional. After loading, the `AI_CACHE_TTL`
//! environment variable (milliseconds) overrides `cache.default_ttl_ms`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::tracker::{AlertThresholds, DEFAULT_INPUT_PREVIEW_LIMIT, TrackerConfig};
use crate::{MuninnError, Result};

/// Environment variable overriding the default cache TTL, in milliseconds.
pub const CACHE_TTL_ENV: &str = "AI_CACHE_TTL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub sinks: SinksSection,
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Default TTL in milliseconds (default: 24 hours).
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Sweep interval in milliseconds (default: 1 hour).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Per-operation TTLs in milliseconds.
    #[serde(default)]
    pub ttl_overrides_ms: HashMap<String, u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            ttl_overrides_ms: HashMap::new(),
        }
    }
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

fn default_sweep_interval_ms() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_millis() as u64
}

/// Error tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSection {
    /// Characters of call input stored per record (default: 200).
    #[serde(default = "default_preview_limit")]
    pub input_preview_limit: usize,
    /// Default window for stats queries, in days (default: 7).
    #[serde(default = "default_window_days")]
    pub stats_window_days: u32,
    #[serde(default)]
    pub thresholds: AlertThresholds,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            input_preview_limit: default_preview_limit(),
            stats_window_days: default_window_days(),
            thresholds: AlertThresholds::default(),
        }
    }
}

fn default_preview_limit() -> usize {
    DEFAULT_INPUT_PREVIEW_LIMIT
}

fn default_window_days() -> u32 {
    7
}

/// Error sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinksSection {
    /// JSON-lines error log (default: `~/.local/share/muninn/ai-errors.jsonl`).
    #[serde(default = "default_jsonl_path")]
    pub jsonl_path: PathBuf,
}

impl Default for SinksSection {
    fn default() -> Self {
        Self {
            jsonl_path: default_jsonl_path(),
        }
    }
}

fn default_jsonl_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("muninn")
        .join("ai-errors.jsonl")
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        section.ttl_overrides_ms.iter().fold(
            CacheConfig::new()
                .ttl(Duration::from_millis(section.default_ttl_ms))
                .sweep_interval(Duration::from_millis(section.sweep_interval_ms)),
            |config, (operation, ms)| config.ttl_override(operation.clone(), Duration::from_millis(*ms)),
        )
    }
}

impl From<&TrackerSection> for TrackerConfig {
    fn from(section: &TrackerSection) -> Self {
        TrackerConfig {
            thresholds: section.thresholds,
            input_preview_limit: section.input_preview_limit,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations, then apply env overrides.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muninn/config.toml`
    /// 3. `/etc/muninn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?
            .ok_or_else(|| {
                MuninnError::Configuration(
                    "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                        .to_string(),
                )
            })?;
        let mut config = Self::load_from_file(&path)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Like [`load()`](Self::load), but uses defaults when no file exists.
    ///
    /// An explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse configuration from TOML text (no env overrides).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MuninnError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MuninnError::Configuration(format!("Failed to render config: {e}")))
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(CACHE_TTL_ENV) {
            self.cache.default_ttl_ms = raw.trim().parse().map_err(|e| {
                MuninnError::Configuration(format!("Invalid {CACHE_TTL_ENV} value {raw:?}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Runtime cache configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::from(&self.cache)
    }

    /// Runtime tracker configuration.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::from(&self.tracker)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path; `None` if no standard file exists.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}
