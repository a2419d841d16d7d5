//! Application configuration module
//!
//! Provides configuration types for the sync engine. Every field has a
//! default, so an empty TOML document is a valid configuration.
//!
//! ```toml
//! server_url = "https://dispatch.example.com"
//!
//! [sync]
//! dead_letter_after = 20
//!
//! [location]
//! report_interval_secs = 15
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server URL
    pub server_url: Option<String>,
    /// Location of the SQLite file backing the local store
    pub database_path: Option<PathBuf>,
    /// Outbox draining behaviour
    pub sync: SyncConfig,
    /// Location reporting behaviour
    pub location: LocationConfig,
}

/// Outbox draining and retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drain the outbox when connectivity returns
    pub auto_sync_on_reconnect: bool,
    /// Park an action in `dead_letters` once it has failed this many times.
    /// `None` keeps retrying forever.
    pub dead_letter_after: Option<u32>,
    /// First follow-up drain delay after a failed attempt
    pub retry_base_secs: u64,
    /// Upper bound for the follow-up drain delay
    pub retry_max_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_on_reconnect: true,
            dead_letter_after: None,
            retry_base_secs: 5,
            retry_max_secs: 300,
        }
    }
}

/// Periodic location reporting settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Seconds between periodic reports
    pub report_interval_secs: u64,
    /// Upper bound for a single position request
    pub sample_timeout_secs: u64,
    /// Oldest cached fix the platform may hand back
    pub maximum_age_secs: u64,
    /// Movement below this distance does not produce a ping
    pub min_displacement_m: f64,
    /// Ask the platform for a GPS-grade fix
    pub high_accuracy: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
            sample_timeout_secs: 15,
            maximum_age_secs: 5,
            min_displacement_m: 20.0,
            high_accuracy: true,
        }
    }
}

impl LocationConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout_secs)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_secs(self.maximum_age_secs)
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            validate_url(url)?;
        }
        if self.location.report_interval_secs == 0 {
            return Err(ConfigError::OutOfRange("location.report_interval_secs"));
        }
        if self.location.sample_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange("location.sample_timeout_secs"));
        }
        if !(self.location.min_displacement_m >= 0.0) {
            return Err(ConfigError::OutOfRange("location.min_displacement_m"));
        }
        if self.sync.retry_base_secs > self.sync.retry_max_secs {
            return Err(ConfigError::OutOfRange("sync.retry_base_secs"));
        }
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let valid = reqwest::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    sync: Option<SyncConfig>,
    location: Option<LocationConfig>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: String) -> Self {
        self.server_url = Some(url);
        self
    }

    /// Set the SQLite file path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn location(mut self, location: LocationConfig) -> Self {
        self.location = Some(location);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self.server_url,
            database_path: self.database_path,
            sync: self.sync.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("could not parse configuration: {0}")]
    Parse(String),
}
