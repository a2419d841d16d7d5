//! Database Schema Definitions
//!
//! Collections, their secondary indexes and the schema version that
//! namespaces the local database.

/// Name of the local database; the file is `<DATABASE_NAME>.db`
pub const DATABASE_NAME: &str = "driver-app-db";

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Every migration, oldest first; the last one equals the current version
const MIGRATIONS: [i32; 1] = [CURRENT_SCHEMA_VERSION];

/// Migrations a store at `applied` still has to record
pub fn pending_migrations(applied: i32) -> impl Iterator<Item = i32> {
    MIGRATIONS.into_iter().filter(move |&version| version > applied)
}

/// Logical record collection inside the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Cached delivery snapshots
    Deliveries,
    /// Cached route snapshots
    Routes,
    /// Cached driver profile
    Drivers,
    /// Outbox of pending actions
    SyncQueue,
    /// Captured photo bytes awaiting upload
    Photos,
    /// Actions parked after too many failed attempts
    DeadLetters,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Deliveries,
        Collection::Routes,
        Collection::Drivers,
        Collection::SyncQueue,
        Collection::Photos,
        Collection::DeadLetters,
    ];

    /// Collections holding server-owned snapshots
    pub const ENTITY_CACHE: [Collection; 3] =
        [Collection::Deliveries, Collection::Routes, Collection::Drivers];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Deliveries => "deliveries",
            Collection::Routes => "routes",
            Collection::Drivers => "drivers",
            Collection::SyncQueue => "sync_queue",
            Collection::Photos => "photos",
            Collection::DeadLetters => "dead_letters",
        }
    }

    /// Keys are allocated by the store when a record has none
    pub fn auto_increment(&self) -> bool {
        matches!(self, Collection::SyncQueue)
    }

    pub fn indexes(&self) -> &'static [StoreIndex] {
        match self {
            Collection::Deliveries => &[StoreIndex::Status, StoreIndex::Date],
            Collection::Routes => &[StoreIndex::Date],
            Collection::Drivers => &[],
            Collection::SyncQueue => &[StoreIndex::CreatedAt],
            Collection::Photos => &[StoreIndex::DeliveryId],
            Collection::DeadLetters => &[StoreIndex::CreatedAt],
        }
    }

    pub fn has_index(&self, index: StoreIndex) -> bool {
        self.indexes().contains(&index)
    }
}

/// Secondary index over a top-level record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreIndex {
    Status,
    Date,
    CreatedAt,
    DeliveryId,
}

impl StoreIndex {
    pub fn name(&self) -> &'static str {
        match self {
            StoreIndex::Status => "status",
            StoreIndex::Date => "date",
            StoreIndex::CreatedAt => "created_at",
            StoreIndex::DeliveryId => "delivery_id",
        }
    }

    /// JSON path the index reads from the stored record
    pub fn json_path(&self) -> &'static str {
        match self {
            StoreIndex::Status => "$.status",
            StoreIndex::Date => "$.date",
            StoreIndex::CreatedAt => "$.created_at",
            StoreIndex::DeliveryId => "$.delivery_id",
        }
    }
}
