//! Shared Module
//!
//! Platform-agnostic types used by every part of the sync engine: the
//! queued action model, position math, configuration and the error
//! taxonomy. Nothing in here touches storage, the network or the clock
//! beyond timestamping.

/// Queued action model
pub mod action;

/// Position samples and haversine distance
pub mod geo;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use action::{
    DeliveryStatus, LocationPing, PhotoType, PhotoUpload, QueuedAction, SignatureCapture,
    StatusUpdate, SyncAction,
};
pub use config::{AppConfig, AppConfigBuilder, ConfigError, LocationConfig, SyncConfig};
pub use error::SyncError;
pub use geo::{haversine_km, MovementFilter, Position};
