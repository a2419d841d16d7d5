use crate::client::local_db::LocalDatabase;
use crate::shared::config::{AppConfig, ConfigError, LocationConfig, SyncConfig};
use std::path::PathBuf;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Optional TOML file with the base configuration
const CONFIG_FILE_ENV: &str = "FIELDSYNC_CONFIG";
const API_URL_ENV: &str = "FIELDSYNC_API_URL";
const DB_PATH_ENV: &str = "FIELDSYNC_DB_PATH";

/// Runtime configuration: validated settings plus the session token.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            tracing::warn!("ignoring invalid environment configuration: {}", e);
            Self::from_app(AppConfig::default())
        })
    }
}

impl Config {
    /// Create a new configuration from the environment, falling back to defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_app(app: AppConfig) -> Self {
        Self { app, token: None }
    }

    /// Load `FIELDSYNC_CONFIG` (if set), then apply `FIELDSYNC_API_URL` and
    /// `FIELDSYNC_DB_PATH` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut app = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => {
                let source = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Parse(format!("{}: {}", path, e)))?;
                AppConfig::from_toml_str(&source)?
            }
            Err(_) => AppConfig::default(),
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            app.server_url = Some(url);
        }
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            app.database_path = Some(PathBuf::from(path));
        }

        app.validate()?;
        Ok(Self::from_app(app))
    }

    /// Set the bearer token of the current session
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the bearer token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Clear the token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the full URL for an API endpoint
    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn database_path(&self) -> PathBuf {
        self.app
            .database_path
            .clone()
            .unwrap_or_else(LocalDatabase::default_path)
    }

    pub fn sync(&self) -> &SyncConfig {
        &self.app.sync
    }

    pub fn location(&self) -> &LocationConfig {
        &self.app.location
    }
}
