//! Configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`DUO_BACKEND_URL`, `DUO_CONFIG`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the client logs a warning and
//! starts with defaults. A TOML file that exists but does not parse is.

use crate::feedback::MissingFeedbackPolicy;
use crate::sample::{LayoutKind, SampleLayout};
use crate::session::SessionSettings;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Backend base URL used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/duo/api";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "DUO_BACKEND_URL";

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "DUO_CONFIG";

/// Configuration file contents
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TomlConfig {
    /// Backend base URL (optional, falls back to [`DEFAULT_BACKEND_URL`])
    #[serde(default)]
    pub backend_url: Option<String>,

    /// "I'm all done" is allowed once more than this many samples were shown
    #[serde(default = "default_done_unlocks_after")]
    pub done_unlocks_after: u32,

    /// Scenario count of a participant who has not started yet
    #[serde(default = "default_total_scenarios")]
    pub total_scenarios: usize,

    #[serde(default)]
    pub sample: SampleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sample reconciliation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SampleConfig {
    #[serde(default)]
    pub layout: LayoutKind,

    /// Whether each row's hidden `id` cell takes part in feedback
    #[serde(default = "default_id_in_feedback")]
    pub id_in_feedback: bool,

    #[serde(default)]
    pub missing_feedback: MissingFeedbackPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            layout: LayoutKind::default(),
            id_in_feedback: default_id_in_feedback(),
            missing_feedback: MissingFeedbackPolicy::default(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            done_unlocks_after: default_done_unlocks_after(),
            total_scenarios: default_total_scenarios(),
            sample: SampleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_done_unlocks_after() -> u32 {
    8
}

fn default_total_scenarios() -> usize {
    5
}

fn default_id_in_feedback() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Session rules derived from this configuration
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            layout: SampleLayout {
                kind: self.sample.layout,
                id_in_feedback: self.sample.id_in_feedback,
            },
            missing_feedback: self.sample.missing_feedback,
            done_unlocks_after: self.done_unlocks_after,
            total_scenarios: self.total_scenarios,
        }
    }
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub log_level: String,
    pub settings: SessionSettings,
}

/// Locate the TOML config file
///
/// Priority: explicit path → `DUO_CONFIG` → `<config dir>/duo/config.toml`
/// when it exists.
pub fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|d| d.join("duo").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Parse the config file if there is one, else use defaults
pub fn load_toml_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };
    if !path.exists() {
        warn!("Config file {} not found, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }
    let config = load_toml(path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Backend URL: CLI → `DUO_BACKEND_URL` → TOML → default
pub fn resolve_backend_url(cli_arg: Option<&str>, toml: &TomlConfig) -> String {
    let url = cli_arg
        .map(str::to_string)
        .or_else(|| std::env::var(BACKEND_URL_ENV).ok())
        .or_else(|| toml.backend_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    url.trim_end_matches('/').to_string()
}

/// Resolve everything the client needs to start
pub fn resolve(cli_backend_url: Option<&str>, cli_config: Option<&Path>) -> Result<ClientConfig> {
    let path = config_file_path(cli_config);
    let toml = load_toml_or_default(path.as_deref())?;
    let backend_url = resolve_backend_url(cli_backend_url, &toml);
    if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
        return Err(Error::Config(format!(
            "Backend URL must be http(s): {}",
            backend_url
        )));
    }
    Ok(ClientConfig {
        backend_url,
        log_level: toml.logging.level.clone(),
        settings: toml.session_settings(),
    })
}
