//! Trading core configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration; unknown keys are rejected.
//!
//! ```toml
//! lock_timeout_ms = 50
//! lock_retries = 3
//! dispute_window_secs = 3600
//! price_tick = "0.01"
//! quantity_step = "0.0001"
//! event_capacity = 1024
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use types::ids::UserId;
use types::numeric::{PRICE_SCALE, QUANTITY_SCALE};
use types::time::NANOS_PER_SECOND;

use crate::logging::LoggingConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradingConfig {
    /// Single attempt at an outcome lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Attempts after the first timeout before reporting `Busy`
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    /// Time between a resolution request and the earliest finalization
    #[serde(default)]
    pub dispute_window_secs: u64,

    #[serde(default = "default_step")]
    pub price_tick: Decimal,

    #[serde(default = "default_step")]
    pub quantity_step: Decimal,

    /// Events buffered per market for the slowest subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Users allowed to close any market
    #[serde(default)]
    pub admins: Vec<UserId>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_lock_timeout_ms() -> u64 {
    50
}

fn default_lock_retries() -> u32 {
    3
}

fn default_event_capacity() -> usize {
    1024
}

fn default_step() -> Decimal {
    Decimal::new(1, 4)
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_retries: default_lock_retries(),
            dispute_window_secs: 0,
            price_tick: default_step(),
            quantity_step: default_step(),
            event_capacity: default_event_capacity(),
            admins: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TradingConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TradingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "lock_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        check_step("price_tick", self.price_tick, PRICE_SCALE)?;
        if self.price_tick >= Decimal::ONE {
            return Err(ConfigError::Invalid {
                field: "price_tick",
                reason: format!("{} leaves no price inside (0, 1)", self.price_tick),
            });
        }
        check_step("quantity_step", self.quantity_step, QUANTITY_SCALE)?;
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be positive".to_string(),
            });
        }
        if !self.logging.is_known_format() {
            return Err(ConfigError::Invalid {
                field: "logging.format",
                reason: format!("unknown format {:?}", self.logging.format),
            });
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn dispute_window_nanos(&self) -> i64 {
        i64::try_from(self.dispute_window_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(NANOS_PER_SECOND)
    }
}

fn check_step(field: &'static str, step: Decimal, scale: u32) -> Result<(), ConfigError> {
    if step <= Decimal::ZERO {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} must be positive", step),
        });
    }
    if step.normalize().scale() > scale {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} has more than {} decimals", step, scale),
        });
    }
    Ok(())
}
