//! Client Module
//!
//! Offline-first sync engine for the delivery-driver app.
//!
//! # Architecture
//!
//! - **`local_db`** - SQLite record store: entity cache, outbox, photos
//! - **`sync`** - network monitor, sync processor and the engine that ties
//!   them to reconnect events
//! - **`offline`** - outbox write path, read-through cache, retry policy
//! - **`location`** - movement-filtered location reporting
//! - **`api_client`** - reqwest client for the delivery backend
//! - **`config`** - runtime configuration and session token
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs
//! ├── config.rs
//! ├── api_client.rs
//! ├── subscription.rs
//! ├── local_db/       - store, schema, photo attachments
//! ├── offline/        - outbox, read-through cache, retry policy
//! ├── sync/           - engine, processor, network monitor
//! └── location/       - tracker and reporter
//! ```

pub mod api_client;
pub mod config;
pub mod local_db;
pub mod location;
pub mod offline;
pub mod subscription;
pub mod sync;

pub use api_client::{ApiError, ApiPath, DeliveryApi, HttpDeliveryApi};
pub use config::Config;
pub use local_db::{Collection, LocalDatabase, StoreError, StoreIndex};
pub use location::{LocationTracker, PositionError, PositionSource};
pub use offline::{ActionSink, EnqueueOutcome, Outbox, ReadThroughCache};
pub use subscription::Subscription;
pub use sync::{NetworkMonitor, SyncEngine, SyncHandle, SyncStatus};
