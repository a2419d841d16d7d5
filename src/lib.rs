//! FieldSync - Offline-First Delivery Sync Engine
//!
//! Client-side sync engine for a delivery-driver app that must keep working
//! through dead zones. Driver actions (status changes, proof-of-delivery
//! photos, signatures, location pings) are durably queued while offline and
//! replayed in order on reconnect; reads fall back to the last cached
//! snapshot of server data.
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types
//!   - Queued action model, position math
//!   - Configuration and error types
//!
//! - **`client`** - The engine itself
//!   - Local SQLite store
//!   - Outbox, sync processor, network monitor
//!   - Read-through cache and location reporting
//!   - HTTP client for the delivery backend
//!
//! # Usage
//!
//! ```rust,no_run
//! use fieldsync::client::{Config, HttpDeliveryApi, LocalDatabase, NetworkMonitor, SyncEngine};
//! use fieldsync::shared::{DeliveryStatus, StatusUpdate, SyncAction};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new();
//! let store = LocalDatabase::open(config.database_path()).await?;
//! let api = Arc::new(HttpDeliveryApi::new(config.clone())?);
//! let mut engine = SyncEngine::new(store, api, NetworkMonitor::new(false), config.sync());
//! engine.start();
//!
//! let outcome = engine
//!     .queue_action(SyncAction::StatusUpdate(StatusUpdate {
//!         delivery_id: "d-1".to_string(),
//!         status: DeliveryStatus::Delivered,
//!         latitude: None,
//!         longitude: None,
//!         notes: None,
//!         timestamp: chrono::Utc::now(),
//!     }))
//!     .await;
//! assert!(outcome.queued);
//! # Ok(())
//! # }
//! ```
//!
//! # Guarantees
//!
//! - Queued actions are delivered at least once and in insertion order
//!   within a drain pass. The backend must tolerate duplicates.
//! - Cached entities are last-network-read-wins snapshots, never merged.
//! - A failing action never blocks the rest of the queue.
//!
//! # Error Handling
//!
//! - `shared::SyncError` for action execution
//! - `client::StoreError` and `client::ApiError` for the two collaborators
//! - Background paths (drains, cache fallbacks, location sampling) log
//!   through `tracing` and keep going

/// Shared types and data structures
pub mod shared;

/// Offline sync engine
pub mod client;
