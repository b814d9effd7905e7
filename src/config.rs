//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::events::{ActiveDays, TimeRange};
use crate::stats::{BgSource, EngineOptions, GlucoseBounds, GlucoseUnits};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Statistics engine defaults
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// IANA timezone used for weekdays and day boundaries
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub glucose_units: GlucoseUnits,

    /// Pinned glucose source; unset picks cbg when available
    #[serde(default)]
    pub bg_source: Option<BgSource>,

    /// Weekday indices (0 = Sunday); empty means every day
    #[serde(default)]
    pub active_days: ActiveDays,

    /// Overrides the standard bounds for `glucose_units`
    #[serde(default)]
    pub glucose_bounds: Option<GlucoseBounds>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            glucose_units: GlucoseUnits::default(),
            bg_source: None,
            active_days: ActiveDays::all(),
            glucose_bounds: None,
        }
    }
}

impl EngineConfig {
    /// Engine options for `window` using these defaults
    pub fn options(&self, window: TimeRange) -> EngineOptions {
        let mut options = EngineOptions::new(window)
            .timezone(self.timezone.clone())
            .glucose_units(self.glucose_units)
            .active_days(self.active_days.clone());
        if let Some(source) = self.bg_source {
            options = options.bg_source(source);
        }
        if let Some(bounds) = self.glucose_bounds {
            options = options.glucose_bounds(bounds);
        }
        options
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
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

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
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

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("glycostat").join("config.toml")),
            Some(PathBuf::from("/etc/glycostat/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(timezone) = var("GLYCOSTAT_TIMEZONE") {
            self.engine.timezone = timezone;
        }
        if let Some(units) = var("GLYCOSTAT_GLUCOSE_UNITS") {
            match units.parse() {
                Ok(units) => self.engine.glucose_units = units,
                Err(e) => tracing::warn!("Ignoring GLYCOSTAT_GLUCOSE_UNITS: {}", e),
            }
        }

        if let Some(level) = var("GLYCOSTAT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("GLYCOSTAT_LOG_FORMAT") {
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
    r#"# Glycostat Configuration
#
# Environment variables override these settings:
# - GLYCOSTAT_TIMEZONE
# - GLYCOSTAT_GLUCOSE_UNITS
# - GLYCOSTAT_LOG_LEVEL
# - GLYCOSTAT_LOG_FORMAT

[engine]
# IANA timezone for weekday filtering and local day boundaries
timezone = "UTC"

# Units of glucose values in the input data: "mg/dL" or "mmol/L"
glucose_units = "mg/dL"

# Glucose source for average/variability stats: "cbg" or "smbg".
# Unset picks cbg whenever the window has CGM data.
# bg_source = "cbg"

# Restrict statistics to these weekdays (0 = Sunday .. 6 = Saturday).
# Empty means every day.
active_days = []

# Classification bounds, in glucose_units. Defaults follow the units:
# mg/dL 54 / 70 / 180 / 250, mmol/L 3.0 / 3.9 / 10.0 / 13.9
# [engine.glucose_bounds]
# very_low_threshold = 54.0
# target_lower_bound = 70.0
# target_upper_bound = 180.0
# very_high_threshold = 250.0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
