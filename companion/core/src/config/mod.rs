//! TOML Configuration File Support
//!
//! Centralized configuration loading for Zoe, from a TOML file at
//! `~/.config/zoe/zoe.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/zoe/zoe.toml` for configuration
//! - `$XDG_DATA_HOME/zoe/` for the conversation record, the credential and
//!   the log file
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! endpoint = "https://api.anthropic.com/v1/messages"
//! model = "claude-sonnet-4-20250514"
//! max_tokens = 300
//! retries = 3
//! timeout_ms = 30000
//! backoff_ms = 1000
//! rate_limit_multiplier = 2
//!
//! [conversation]
//! max_history = 20
//!
//! [tuning]
//! fragment_cap = 0.18
//! fragment_slope = 0.025
//! awakening_threshold = 3
//! level_step = 5
//! game_discovery_probability = 0.2
//! awakening_delay_ms = 2000
//!
//! [pacing]
//! speed = 1.0
//! idle_tick_min_ms = 2000
//! idle_tick_max_ms = 5000
//! idle_think_ticks = 3
//! idle_mentor_ticks = 5
//!
//! [storage]
//! data_dir = "/home/me/.local/share/zoe"
//! ```
//!
//! The API key is never read from this file: it comes from the credential
//! store or, as a fallback, from `ZOE_API_KEY`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::AnthropicConfig;
use crate::client::RetryConfig;
use crate::mind::MindConfig;
use crate::responder::{ResponderSettings, TuningConfig};
use crate::state::DEFAULT_MAX_HISTORY;

/// Environment variables read by [`load_config`]
pub const ENV_VARS: &[&str] = &[
    "ZOE_API_ENDPOINT",
    "ZOE_MODEL",
    "ZOE_MAX_TOKENS",
    "ZOE_API_RETRIES",
    "ZOE_API_TIMEOUT_MS",
    "ZOE_API_BACKOFF_MS",
    "ZOE_MAX_HISTORY",
    "ZOE_DATA_DIR",
    "ZOE_API_KEY",
];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[api]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Messages endpoint URL
    pub endpoint: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Reply length cap
    pub max_tokens: Option<u32>,
    /// `anthropic-version` header
    pub api_version: Option<String>,
    /// Total attempts per completion
    pub retries: Option<u32>,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Base backoff in milliseconds
    pub backoff_ms: Option<u64>,
    /// Backoff factor on HTTP 429
    pub rate_limit_multiplier: Option<u32>,
}

/// `[conversation]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationToml {
    /// History entries kept as API context
    pub max_history: Option<usize>,
}

/// `[tuning]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningToml {
    /// Fragment probability cap
    pub fragment_cap: Option<f64>,
    /// Fragment probability per turn
    pub fragment_slope: Option<f64>,
    /// Fragments before the awakening
    pub awakening_threshold: Option<u32>,
    /// Game fragments per level
    pub level_step: Option<u32>,
    /// Game discovery probability
    pub game_discovery_probability: Option<f64>,
    /// Delay before the awakening in milliseconds
    pub awakening_delay_ms: Option<u64>,
}

/// `[pacing]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingToml {
    /// Playback speed multiplier (0 = instant)
    pub speed: Option<f64>,
    /// Shortest idle tick in milliseconds
    pub idle_tick_min_ms: Option<u64>,
    /// Longest idle tick in milliseconds
    pub idle_tick_max_ms: Option<u64>,
    /// Idle ticks before thoughts
    pub idle_think_ticks: Option<u32>,
    /// Idle ticks before mentors
    pub idle_mentor_ticks: Option<u32>,
}

/// `[storage]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Directory for the record, credential and log
    pub data_dir: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoeToml {
    /// API section
    pub api: ApiToml,
    /// Conversation section
    pub conversation: ConversationToml,
    /// Tuning section
    pub tuning: TuningToml,
    /// Pacing section
    pub pacing: PacingToml,
    /// Storage section
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for Zoe
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoeConfig {
    /// Remote request parameters
    pub api: AnthropicConfig,

    /// Remote retry policy
    pub retry: RetryConfig,

    /// History entries kept as API context
    pub max_history: usize,

    /// Fragment and game mechanics
    pub tuning: TuningConfig,

    /// Idle loop
    pub mind: MindConfig,

    /// Playback speed multiplier (0 = instant)
    pub pacing_speed: f64,

    /// Directory for the record, credential and log
    pub data_dir: Option<PathBuf>,

    /// Key from the environment (never written anywhere)
    pub api_key: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ZoeConfig {
    fn default() -> Self {
        Self {
            api: AnthropicConfig::default(),
            retry: RetryConfig::default(),
            max_history: DEFAULT_MAX_HISTORY,
            tuning: TuningConfig::default(),
            mind: MindConfig::default(),
            pacing_speed: 1.0,
            data_dir: default_data_dir(),
            api_key: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ZoeConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// The part the responder consumes
    #[must_use]
    pub fn responder_settings(&self) -> ResponderSettings {
        ResponderSettings {
            tuning: self.tuning,
            retry: self.retry,
            api: self.api.clone(),
            max_history: self.max_history,
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.retry.max_attempts == 0 {
            return invalid("api.retries must be at least 1");
        }
        if self.retry.timeout.is_zero() {
            return invalid("api.timeout_ms must be positive");
        }
        if self.max_history == 0 {
            return invalid("conversation.max_history must be at least 1");
        }
        for (name, p) in [
            ("tuning.fragment_cap", self.tuning.fragment_cap),
            ("tuning.fragment_slope", self.tuning.fragment_slope),
            (
                "tuning.game_discovery_probability",
                self.tuning.game_discovery_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be within [0, 1], got {p}"
                )));
            }
        }
        if self.tuning.level_step == 0 {
            return invalid("tuning.level_step must be at least 1");
        }
        if self.mind.tick_min.is_zero() {
            return invalid("pacing.idle_tick_min_ms must be at least 1");
        }
        if self.mind.tick_min > self.mind.tick_max {
            return invalid("pacing.idle_tick_min_ms must not exceed idle_tick_max_ms");
        }
        if !(self.pacing_speed >= 0.0 && self.pacing_speed.is_finite()) {
            return invalid("pacing.speed must be a non-negative number");
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/zoe/zoe.toml` or `~/.config/zoe/zoe.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("zoe").join("zoe.toml"))
}

/// Get the default data directory (`$XDG_DATA_HOME/zoe`)
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("zoe"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are out of range. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<ZoeConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ZoeConfig, ConfigError> {
    let mut config = ZoeConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ZoeToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ZoeConfig, toml: &ZoeToml) {
    // API settings
    if let Some(ref endpoint) = toml.api.endpoint {
        config.api.endpoint.clone_from(endpoint);
    }
    if let Some(ref model) = toml.api.model {
        config.api.model.clone_from(model);
    }
    if let Some(max_tokens) = toml.api.max_tokens {
        config.api.max_tokens = max_tokens;
    }
    if let Some(ref version) = toml.api.api_version {
        config.api.api_version.clone_from(version);
    }
    if let Some(retries) = toml.api.retries {
        config.retry.max_attempts = retries;
    }
    if let Some(ms) = toml.api.timeout_ms {
        config.retry.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.api.backoff_ms {
        config.retry.backoff = Duration::from_millis(ms);
    }
    if let Some(multiplier) = toml.api.rate_limit_multiplier {
        config.retry.rate_limit_multiplier = multiplier;
    }

    // Conversation settings
    if let Some(max_history) = toml.conversation.max_history {
        config.max_history = max_history;
    }

    // Tuning settings
    if let Some(cap) = toml.tuning.fragment_cap {
        config.tuning.fragment_cap = cap;
    }
    if let Some(slope) = toml.tuning.fragment_slope {
        config.tuning.fragment_slope = slope;
    }
    if let Some(threshold) = toml.tuning.awakening_threshold {
        config.tuning.awakening_threshold = threshold;
    }
    if let Some(step) = toml.tuning.level_step {
        config.tuning.level_step = step;
    }
    if let Some(p) = toml.tuning.game_discovery_probability {
        config.tuning.game_discovery_probability = p;
    }
    if let Some(ms) = toml.tuning.awakening_delay_ms {
        config.tuning.awakening_delay = Duration::from_millis(ms);
    }

    // Pacing settings
    if let Some(speed) = toml.pacing.speed {
        config.pacing_speed = speed;
    }
    if let Some(ms) = toml.pacing.idle_tick_min_ms {
        config.mind.tick_min = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.pacing.idle_tick_max_ms {
        config.mind.tick_max = Duration::from_millis(ms);
    }
    if let Some(ticks) = toml.pacing.idle_think_ticks {
        config.mind.think_after = ticks;
    }
    if let Some(ticks) = toml.pacing.idle_mentor_ticks {
        config.mind.mentor_after = ticks;
    }

    // Storage settings
    if toml.storage.data_dir.is_some() {
        config.data_dir.clone_from(&toml.storage.data_dir);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ZoeConfig) {
    if let Ok(endpoint) = std::env::var("ZOE_API_ENDPOINT") {
        config.api.endpoint = endpoint;
        config.source = ConfigSource::Env;
    }
    if let Ok(model) = std::env::var("ZOE_MODEL") {
        config.api.model = model;
        config.source = ConfigSource::Env;
    }
    if let Ok(max_tokens) = std::env::var("ZOE_MAX_TOKENS") {
        if let Ok(n) = max_tokens.parse::<u32>() {
            config.api.max_tokens = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(retries) = std::env::var("ZOE_API_RETRIES") {
        if let Ok(n) = retries.parse::<u32>() {
            config.retry.max_attempts = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(timeout) = std::env::var("ZOE_API_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.retry.timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(backoff) = std::env::var("ZOE_API_BACKOFF_MS") {
        if let Ok(ms) = backoff.parse::<u64>() {
            config.retry.backoff = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(max_history) = std::env::var("ZOE_MAX_HISTORY") {
        if let Ok(n) = max_history.parse::<usize>() {
            config.max_history = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(dir) = std::env::var("ZOE_DATA_DIR") {
        if !dir.is_empty() {
            config.data_dir = Some(PathBuf::from(dir));
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(key) = std::env::var("ZOE_API_KEY") {
        if !key.trim().is_empty() {
            config.api_key = Some(key);
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Model override
    pub model: Option<String>,

    /// Data directory override
    pub data_dir: Option<PathBuf>,

    /// Retry count override
    pub retries: Option<u32>,

    /// Per-attempt timeout override (milliseconds)
    pub timeout_ms: Option<u64>,

    /// Playback speed override
    pub pacing_speed: Option<f64>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set data directory override
    #[must_use]
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    /// Set retry count override
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set timeout override
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set playback speed override
    #[must_use]
    pub fn with_pacing_speed(mut self, speed: f64) -> Self {
        self.pacing_speed = Some(speed);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ZoeConfig) {
        let mut applied = false;

        if let Some(ref model) = self.model {
            config.api.model.clone_from(model);
            applied = true;
        }
        if let Some(ref dir) = self.data_dir {
            config.data_dir = Some(dir.clone());
            applied = true;
        }
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
            applied = true;
        }
        if let Some(ms) = self.timeout_ms {
            config.retry.timeout = Duration::from_millis(ms);
            applied = true;
        }
        if let Some(speed) = self.pacing_speed {
            config.pacing_speed = speed;
            applied = true;
        }

        if applied {
            config.source = ConfigSource::Cli;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
