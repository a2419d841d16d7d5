//! # Local Database Module
//!
//! Durable, namespaced record store backing the offline engine. It holds
//! three kinds of data:
//!
//! - **Entity cache**: last network snapshot of deliveries, routes and the
//!   driver profile (last-network-read-wins, no merge)
//! - **Action queue**: the outbox, keyed by a monotonically increasing
//!   insertion key
//! - **Attachments**: photo bytes captured offline, deleted after upload
//!
//! The store has no business logic. Every operation touches a single record
//! (or a single collection for `clear`) and is atomic on its own; nothing
//! spans collections.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::client::local_db::{Collection, LocalDatabase, StoreIndex};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fieldsync::client::local_db::StoreError> {
//! let db = LocalDatabase::open(LocalDatabase::default_path()).await?;
//!
//! db.put(Collection::Deliveries, json!({"id": "d-1", "status": "pending"}), None).await?;
//! let pending = db
//!     .get_all_by_index(Collection::Deliveries, StoreIndex::Status, "pending")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod attachments;
pub mod schema;

pub use attachments::PhotoAttachment;
pub use schema::{Collection, StoreIndex, CURRENT_SCHEMA_VERSION, DATABASE_NAME};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Local store failures
///
/// `Unavailable` is the storage-unavailable case: callers treat it as a
/// cache miss on reads and as "queue write failed" on writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("could not prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record in '{0}' has no key and the collection does not allocate one")]
    MissingKey(&'static str),

    #[error("collection '{collection}' has no index '{index}'")]
    UnknownIndex {
        collection: &'static str,
        index: &'static str,
    },

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i32, supported: i32 },
}

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local database connection manager
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode so readers never block the outbox writer.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    /// Private in-memory database, used by tests and ephemeral sessions
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // One long-lived connection: the in-memory database dies with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    /// Platform data directory path for the local database file
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("fieldsync");
        path.push(format!("{}.db", DATABASE_NAME));
        path
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Create tables and run any pending migrations
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;

        self.run_migrations().await
    }

    /// Apply migrations newer than the recorded schema version
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current = self.schema_version().await?;

        if current > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: current,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        for version in schema::pending_migrations(current) {
            tracing::info!(version, "applying local store migration");
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Highest applied migration, 0 for a fresh database
    pub async fn schema_version(&self) -> Result<i32> {
        let version: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version.0)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool; later operations fail with `Unavailable`
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM records WHERE collection = ? AND key = ?")
                .bind(collection.name())
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Every record in the collection, in insertion order
    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT value FROM records WHERE collection = ? ORDER BY seq ASC")
                .bind(collection.name())
                .fetch_all(&self.pool)
                .await?;

        decode_rows(rows)
    }

    /// Every record with its store key, in insertion order
    pub async fn get_all_entries(&self, collection: Collection) -> Result<Vec<(String, Value)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM records WHERE collection = ? ORDER BY seq ASC",
        )
        .bind(collection.name())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(key, json)| Ok((key, serde_json::from_str(&json)?)))
            .collect()
    }

    /// Records whose indexed field equals `value`, in insertion order
    pub async fn get_all_by_index(
        &self,
        collection: Collection,
        index: StoreIndex,
        value: &str,
    ) -> Result<Vec<Value>> {
        if !collection.has_index(index) {
            return Err(StoreError::UnknownIndex {
                collection: collection.name(),
                index: index.name(),
            });
        }

        // json_path() is a static string, never user input.
        let sql = format!(
            "SELECT value FROM records
             WHERE collection = ? AND json_extract(value, '{}') = ?
             ORDER BY seq ASC",
            index.json_path()
        );

        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .bind(collection.name())
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        decode_rows(rows)
    }

    /// Insert or overwrite a record, returning its key
    ///
    /// Key resolution: the explicit `key`, else the record's `id` field, else
    /// (auto-increment collections only) the next key from the collection's
    /// sequence, which is also written into the record as `id`.
    pub async fn put(
        &self,
        collection: Collection,
        mut value: Value,
        key: Option<&str>,
    ) -> Result<String> {
        let mut tx = self.pool.begin().await?;

        let key = match key.map(str::to_string).or_else(|| record_key(&value)) {
            Some(key) => key,
            None => {
                let record = match value.as_object_mut() {
                    Some(record) if collection.auto_increment() => record,
                    _ => return Err(StoreError::MissingKey(collection.name())),
                };

                let next: i64 = sqlx::query_scalar(
                    "INSERT INTO key_sequences (collection, last_key) VALUES (?, 1)
                     ON CONFLICT (collection) DO UPDATE SET last_key = last_key + 1
                     RETURNING last_key",
                )
                .bind(collection.name())
                .fetch_one(&mut *tx)
                .await?;

                record.insert("id".to_string(), Value::from(next));
                next.to_string()
            }
        };

        sqlx::query(
            "INSERT INTO records (collection, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
        )
        .bind(collection.name())
        .bind(&key)
        .bind(serde_json::to_string(&value)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(key)
    }

    /// Overwrite a record only if it is still present
    ///
    /// Returns `false` when the key is gone, so a record deleted by a
    /// concurrent writer is never resurrected.
    pub async fn update(&self, collection: Collection, key: &str, value: &Value) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE records SET value = ?, updated_at = ? WHERE collection = ? AND key = ?",
        )
        .bind(serde_json::to_string(value)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(collection.name())
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a record; deleting a missing key is a no-op
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE collection = ? AND key = ?")
            .bind(collection.name())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every record in the collection, returning how many went
    pub async fn clear(&self, collection: Collection) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection.name())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self, collection: Collection) -> Result<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 as u64)
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get(collection, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn put_as<T: Serialize>(
        &self,
        collection: Collection,
        record: &T,
        key: Option<&str>,
    ) -> Result<String> {
        self.put(collection, serde_json::to_value(record)?, key).await
    }

    /// Explicit cache clear: drops cached entities, keeps the outbox and
    /// attachments
    pub async fn clear_cache(&self) -> Result<u64> {
        let mut removed = 0;
        for collection in Collection::ENTITY_CACHE {
            removed += self.clear(collection).await?;
        }
        Ok(removed)
    }

    /// Record counts per collection, for status displays
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            cached_deliveries: self.count(Collection::Deliveries).await?,
            cached_routes: self.count(Collection::Routes).await?,
            pending_actions: self.count(Collection::SyncQueue).await?,
            stored_photos: self.count(Collection::Photos).await?,
            dead_letters: self.count(Collection::DeadLetters).await?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub cached_deliveries: u64,
    pub cached_routes: u64,
    /// Outbox entries not yet confirmed by the server
    pub pending_actions: u64,
    pub stored_photos: u64,
    pub dead_letters: u64,
}

fn record_key(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn decode_rows(rows: Vec<String>) -> Result<Vec<Value>> {
    rows.iter()
        .map(|json| serde_json::from_str(json).map_err(StoreError::from))
        .collect()
}
