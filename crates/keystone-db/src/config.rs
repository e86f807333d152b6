//! # POS Configuration
//!
//! Configuration for the database, the register calendar, and pricing.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     KEYSTONE_DB_PATH=/var/lib/keystone/pos.db                           │
//! │     KEYSTONE_TIMEZONE=America/Mexico_City                               │
//! │     KEYSTONE_CUTOFF=22:00                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/keystone-pos/keystone.toml (Linux)                        │
//! │     ~/Library/Application Support/com.keystone.pos/keystone.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     UTC, cutoff 23:00, wholesale from 12 units                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/keystone/pos.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [register]
//! timezone = "America/Mexico_City"
//! cutoff = "22:00"
//! sweep_interval_secs = 60
//!
//! [pricing]
//! wholesale_threshold = 12
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::PosError;
use crate::pool::DbConfig;
use keystone_core::{BusinessCalendar, PricingPolicy, Quantity};

const CONFIG_FILE_NAME: &str = "keystone.toml";

// =============================================================================
// Errors
// =============================================================================

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoPath,
}

impl From<ConfigError> for PosError {
    fn from(err: ConfigError) -> Self {
        PosError::Config(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer queues on SQLite's lock (seconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Register Settings
// =============================================================================

/// Business day boundaries for cash sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSettings {
    /// IANA timezone name of the branch.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local `HH:MM` after which sales stop and sessions auto-close.
    #[serde(default = "default_cutoff")]
    pub cutoff: String,

    /// Period of the register sweeper (seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_cutoff() -> String {
    "23:00".to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for RegisterSettings {
    fn default() -> Self {
        RegisterSettings {
            timezone: default_timezone(),
            cutoff: default_cutoff(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Whole units in a basket from which wholesale prices apply.
    #[serde(default = "default_wholesale_threshold")]
    pub wholesale_threshold: u32,
}

fn default_wholesale_threshold() -> u32 {
    12
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            wholesale_threshold: default_wholesale_threshold(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub register: RegisterSettings,

    #[serde(default)]
    pub pricing: PricingSettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (keystone.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let calendar = self.calendar()?;
        if calendar.cutoff == chrono::NaiveTime::MIN {
            return Err(ConfigError::Invalid(
                "cutoff 00:00 would close every session as soon as it opens".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.register.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }

        if self.pricing.wholesale_threshold == 0 {
            return Err(ConfigError::Invalid(
                "wholesale_threshold must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `KEYSTONE_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("KEYSTONE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(max) = lookup("KEYSTONE_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring KEYSTONE_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(tz) = lookup("KEYSTONE_TIMEZONE") {
            debug!(timezone = %tz, "Overriding timezone from environment");
            self.register.timezone = tz;
        }

        if let Some(cutoff) = lookup("KEYSTONE_CUTOFF") {
            debug!(cutoff = %cutoff, "Overriding cutoff from environment");
            self.register.cutoff = cutoff;
        }

        if let Some(secs) = lookup("KEYSTONE_SWEEP_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.register.sweep_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring KEYSTONE_SWEEP_INTERVAL_SECS"),
            }
        }

        if let Some(threshold) = lookup("KEYSTONE_WHOLESALE_THRESHOLD") {
            match threshold.parse::<u32>() {
                Ok(t) => self.pricing.wholesale_threshold = t,
                Err(_) => warn!(value = %threshold, "Ignoring KEYSTONE_WHOLESALE_THRESHOLD"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "keystone", "pos")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn default_database_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "keystone", "pos")
            .map(|dirs| dirs.data_dir().join("keystone.db"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    /// The branch business calendar.
    pub fn calendar(&self) -> ConfigResult<BusinessCalendar> {
        BusinessCalendar::parse(&self.register.timezone, &self.register.cutoff)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            wholesale_threshold: Quantity::from_units(i64::from(self.pricing.wholesale_threshold)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.register.sweep_interval_secs)
    }

    /// Pool configuration for the configured database file.
    pub fn db_config(&self) -> ConfigResult<DbConfig> {
        let path = self
            .database
            .path
            .clone()
            .or_else(Self::default_database_path)
            .ok_or(ConfigError::NoPath)?;

        Ok(DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PosConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.register.timezone, "UTC");
        assert_eq!(
            config.pricing_policy().wholesale_threshold,
            Quantity::from_units(12)
        );
    }

    #[test]
    fn test_parse_toml_with_missing_sections() {
        let config: PosConfig = toml::from_str(
            r#"
            [register]
            timezone = "America/Mexico_City"
            cutoff = "22:00"
            "#,
        )
        .unwrap();

        assert_eq!(config.register.cutoff, "22:00");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.pricing.wholesale_threshold, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("KEYSTONE_TIMEZONE", "Europe/Madrid"),
            ("KEYSTONE_CUTOFF", "21:30"),
            ("KEYSTONE_WHOLESALE_THRESHOLD", "24"),
            ("KEYSTONE_DB_MAX_CONNECTIONS", "lots"),
        ]
        .into_iter()
        .collect();

        let mut config = PosConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.register.timezone, "Europe/Madrid");
        assert_eq!(config.register.cutoff, "21:30");
        assert_eq!(config.pricing.wholesale_threshold, 24);
        // Unparseable value is ignored
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PosConfig::default();
        config.register.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());

        let mut config = PosConfig::default();
        config.register.cutoff = "00:00".into();
        assert!(config.validate().is_err());

        let mut config = PosConfig::default();
        config.register.cutoff = "25:00".into();
        assert!(config.validate().is_err());

        let mut config = PosConfig::default();
        config.pricing.wholesale_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystone.toml");

        let mut config = PosConfig::default();
        config.register.timezone = "America/Bogota".into();
        config.database.path = Some(dir.path().join("pos.db"));
        config.save(Some(path.clone())).unwrap();

        let loaded = PosConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.register.timezone, "America/Bogota");
        assert_eq!(loaded.db_config().unwrap().database_path, dir.path().join("pos.db"));
    }
}
