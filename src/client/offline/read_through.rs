//! Read-through cache over the delivery API.
//!
//! Online reads hit the network and overwrite the cached snapshot
//! (last-network-read-wins). Offline reads, or reads whose network call
//! fails, return whatever was cached last. Errors never reach the caller:
//! a miss is `None`.

use crate::client::api_client::{ApiPath, DeliveryApi};
use crate::client::local_db::{Collection, LocalDatabase, StoreIndex};
use crate::client::sync::network_monitor::NetworkMonitor;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Where a read was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Network,
    Cache,
}

/// Value plus its origin, so the UI can flag stale data
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRead<T> {
    pub value: Option<T>,
    pub source: ReadSource,
}

impl<T> CachedRead<T> {
    fn network(value: T) -> Self {
        Self { value: Some(value), source: ReadSource::Network }
    }

    fn cache(value: Option<T>) -> Self {
        Self { value, source: ReadSource::Cache }
    }

    pub fn is_stale(&self) -> bool {
        self.source == ReadSource::Cache
    }
}

pub struct ReadThroughCache<A> {
    api: Arc<A>,
    store: LocalDatabase,
    monitor: NetworkMonitor,
}

impl<A> Clone for ReadThroughCache<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: self.store.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl<A: DeliveryApi> ReadThroughCache<A> {
    pub fn new(api: Arc<A>, store: LocalDatabase, monitor: NetworkMonitor) -> Self {
        Self { api, store, monitor }
    }

    /// Read one entity, caching it under `key`
    pub async fn read(&self, collection: Collection, key: &str, path: &ApiPath) -> CachedRead<Value> {
        if let Some(value) = self.fetch(path).await {
            if let Err(e) = self.store.put(collection, value.clone(), Some(key)).await {
                tracing::warn!(collection = collection.name(), key, "could not cache response: {}", e);
            }
            return CachedRead::network(value);
        }

        let cached = match self.store.get(collection, key).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(collection = collection.name(), key, "cache read failed: {}", e);
                None
            }
        };
        CachedRead::cache(cached)
    }

    /// [`read`](Self::read), decoded; an undecodable value reads as a miss
    pub async fn read_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
        path: &ApiPath,
    ) -> CachedRead<T> {
        let CachedRead { value, source } = self.read(collection, key, path).await;
        let value = value.and_then(|value| match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(collection = collection.name(), key, "cached value has unexpected shape: {}", e);
                None
            }
        });
        CachedRead { value, source }
    }

    /// Read a list endpoint, caching each element under its `id`
    ///
    /// The offline fallback returns the cached records matching `filter`, or
    /// the whole collection without one.
    pub async fn read_list(
        &self,
        collection: Collection,
        path: &ApiPath,
        filter: Option<(StoreIndex, &str)>,
    ) -> CachedRead<Vec<Value>> {
        match self.fetch(path).await {
            Some(Value::Array(items)) => {
                for item in &items {
                    if let Err(e) = self.store.put(collection, item.clone(), None).await {
                        tracing::warn!(collection = collection.name(), "could not cache list item: {}", e);
                    }
                }
                return CachedRead::network(items);
            }
            Some(_) => tracing::warn!(%path, "expected a JSON array, using cache"),
            None => {}
        }

        let cached = match filter {
            Some((index, value)) => self.store.get_all_by_index(collection, index, value).await,
            None => self.store.get_all(collection).await,
        };
        match cached {
            Ok(items) => CachedRead::cache(Some(items)),
            Err(e) => {
                tracing::warn!(collection = collection.name(), "cache read failed: {}", e);
                CachedRead::cache(None)
            }
        }
    }

    pub async fn delivery(&self, delivery_id: &str) -> CachedRead<Value> {
        let path = ApiPath::new(["api", "deliveries", delivery_id]);
        self.read(Collection::Deliveries, delivery_id, &path).await
    }

    /// Deliveries scheduled on `date` (`YYYY-MM-DD`)
    pub async fn deliveries_for_date(&self, date: &str) -> CachedRead<Vec<Value>> {
        let path = ApiPath::new(["api", "deliveries"]).query("date", date);
        self.read_list(Collection::Deliveries, &path, Some((StoreIndex::Date, date)))
            .await
    }

    /// Route for `date`, cached under the date so it can be found offline
    pub async fn route_for_date(&self, date: &str) -> CachedRead<Value> {
        let path = ApiPath::new(["api", "routes", "current"]).query("date", date);
        self.read(Collection::Routes, date, &path).await
    }

    pub async fn driver_profile(&self) -> CachedRead<Value> {
        let path = ApiPath::new(["api", "driver", "me"]);
        self.read(Collection::Drivers, "me", &path).await
    }

    async fn fetch(&self, path: &ApiPath) -> Option<Value> {
        if !self.monitor.is_online() {
            return None;
        }
        match self.api.fetch_json(path).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%path, "network read failed, using cache: {}", e);
                None
            }
        }
    }
}
