use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::DEFAULT_WIP_LIMIT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for capwork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CapworkConfig {
    /// Assignment and admission-control settings
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Composite score weights used by the matcher
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Minimum proficiency (1-5) a capability needs to qualify
    #[serde(default = "default_min_proficiency")]
    pub min_proficiency: u8,

    /// How many ranked candidates are tried before a task is parked
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Total queue depth at which backpressure is reported
    #[serde(default = "default_backpressure_threshold")]
    pub backpressure_threshold: usize,

    /// WIP limit applied to agents registered without one
    #[serde(default = "default_wip_limit")]
    pub default_wip_limit: u32,

    /// Never claim capacity on OFFLINE agents
    #[serde(default = "default_skip_offline_agents")]
    pub skip_offline_agents: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            min_proficiency: default_min_proficiency(),
            max_candidates: default_max_candidates(),
            backpressure_threshold: default_backpressure_threshold(),
            default_wip_limit: default_wip_limit(),
            skip_offline_agents: default_skip_offline_agents(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_proficiency_weight")]
    pub proficiency_weight: f64,

    #[serde(default = "default_availability_weight")]
    pub availability_weight: f64,

    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,

    #[serde(default = "default_load_weight")]
    pub load_weight: f64,

    /// Availability factor for BUSY agents (AVAILABLE is 1.0, OFFLINE 0.0)
    #[serde(default = "default_busy_availability")]
    pub busy_availability: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            proficiency_weight: default_proficiency_weight(),
            availability_weight: default_availability_weight(),
            quality_weight: default_quality_weight(),
            load_weight: default_load_weight(),
            busy_availability: default_busy_availability(),
        }
    }
}

impl ScoringConfig {
    pub fn total_weight(&self) -> f64 {
        self.proficiency_weight + self.availability_weight + self.quality_weight + self.load_weight
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_min_proficiency() -> u8 {
    3
}
fn default_max_candidates() -> usize {
    3
}
fn default_backpressure_threshold() -> usize {
    10
}
fn default_wip_limit() -> u32 {
    DEFAULT_WIP_LIMIT
}
fn default_skip_offline_agents() -> bool {
    true
}
fn default_proficiency_weight() -> f64 {
    0.4
}
fn default_availability_weight() -> f64 {
    0.3
}
fn default_quality_weight() -> f64 {
    0.2
}
fn default_load_weight() -> f64 {
    0.1
}
fn default_busy_availability() -> f64 {
    0.5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

const LOCAL_CONFIG: &str = ".capwork.toml";

/// Configuration manager: file discovery, env overrides and validation
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: CapworkConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (./.capwork.toml, then ~/.capwork/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!(path = %path.display(), "Loaded capwork configuration"),
            None => info!("No capwork config file found, using defaults"),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load a specific file; env overrides still apply.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::apply_env_overrides(Self::read_toml_file(path)?);
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory config after validating it.
    pub fn from_config(config: CapworkConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }

    fn load_config_file() -> Result<(CapworkConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(LOCAL_CONFIG);
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".capwork").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((CapworkConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<CapworkConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: CapworkConfig) -> CapworkConfig {
        if let Some(v) = env_parse("CAPWORK_MIN_PROFICIENCY") {
            config.routing.min_proficiency = v;
        }
        if let Some(v) = env_parse("CAPWORK_MAX_CANDIDATES") {
            config.routing.max_candidates = v;
        }
        if let Some(v) = env_parse("CAPWORK_BACKPRESSURE_THRESHOLD") {
            config.routing.backpressure_threshold = v;
        }
        if let Some(v) = env_parse("CAPWORK_DEFAULT_WIP_LIMIT") {
            config.routing.default_wip_limit = v;
        }
        if let Ok(skip) = std::env::var("CAPWORK_SKIP_OFFLINE") {
            config.routing.skip_offline_agents = skip.to_lowercase() == "true" || skip == "1";
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            // Directive strings like "capwork=debug" stay with EnvFilter.
            if !level.contains('=') && !level.contains(',') {
                config.logging.level = level.to_lowercase();
            }
        }
        if let Ok(format) = std::env::var("CAPWORK_LOG_FORMAT") {
            config.logging.format = format.to_lowercase();
        }

        config
    }

    pub fn validate_config(config: &CapworkConfig) -> Result<(), ConfigError> {
        let routing = &config.routing;
        if !(1..=5).contains(&routing.min_proficiency) {
            return Err(ConfigError::ValidationError(format!(
                "min_proficiency must be between 1 and 5, got {}",
                routing.min_proficiency
            )));
        }
        if routing.max_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        if routing.backpressure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "backpressure_threshold must be at least 1".to_string(),
            ));
        }

        let scoring = &config.scoring;
        let weights = [
            ("proficiency_weight", scoring.proficiency_weight),
            ("availability_weight", scoring.availability_weight),
            ("quality_weight", scoring.quality_weight),
            ("load_weight", scoring.load_weight),
            ("busy_availability", scoring.busy_availability),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if scoring.busy_availability > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "busy_availability must not exceed 1.0, got {}",
                scoring.busy_availability
            )));
        }
        if (scoring.total_weight() - 1.0).abs() > 1e-6 {
            return Err(ConfigError::ValidationError(format!(
                "scoring weights must sum to 1.0, got {}",
                scoring.total_weight()
            )));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error, off",
                    other
                )))
            }
        }
        match config.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact, json",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &CapworkConfig {
        &self.config
    }

    pub fn into_config(self) -> CapworkConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Write a default config file, creating parent directories as needed.
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = CapworkConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable {}={}", key, raw);
            None
        }
    }
}
