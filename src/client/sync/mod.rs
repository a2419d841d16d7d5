//! # Sync Engine
//!
//! Wires the pieces of the offline engine together and runs the reconnect
//! loop:
//!
//! - **Network Monitor**: connectivity flag and transitions
//! - **Sync Processor**: drains the outbox against the API
//! - **Outbox**: write path for driver actions
//! - **Read-Through Cache**: read path for server entities
//!
//! Writes that should move the "N pending" indicator go through the engine
//! or a [`SyncHandle`] from [`SyncEngine::sink`], never the bare outbox.
//!
//! While started, every offline-to-online transition triggers exactly one
//! drain. If a drain leaves failures behind, a follow-up drain is scheduled
//! with the retry policy's backoff. A drain that starts while another is in
//! flight joins it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::client::api_client::HttpDeliveryApi;
//! use fieldsync::client::config::Config;
//! use fieldsync::client::local_db::LocalDatabase;
//! use fieldsync::client::sync::{NetworkMonitor, SyncEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new();
//! let store = LocalDatabase::open(config.database_path()).await?;
//! let api = Arc::new(HttpDeliveryApi::new(config.clone())?);
//!
//! let mut engine = SyncEngine::new(store, api, NetworkMonitor::new(true), config.sync());
//! engine.start();
//!
//! let status = engine.subscribe_status();
//! println!("pending: {}", status.borrow().pending);
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;
pub mod processor;

pub use network_monitor::{ConnectivityProvider, NetworkEvent, NetworkMonitor};
pub use processor::{DrainReport, SyncProcessor};

use crate::client::api_client::DeliveryApi;
use crate::client::local_db::{Collection, LocalDatabase};
use crate::client::offline::{ActionSink, EnqueueOutcome, Outbox, ReadThroughCache, RetryPolicy};
use crate::shared::{PhotoType, SyncAction, SyncConfig};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Snapshot for the "N pending" indicator and sync spinner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStatus {
    pub online: bool,
    pub syncing: bool,
    /// Outbox entries not yet confirmed by the server
    pub pending: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_report: Option<DrainReport>,
}

/// Clonable write handle that keeps [`SyncStatus::pending`] current
///
/// Hand this to the location tracker and capture flows instead of the
/// outbox.
pub struct SyncHandle<A> {
    outbox: Outbox<A>,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl<A> Clone for SyncHandle<A> {
    fn clone(&self) -> Self {
        Self {
            outbox: self.outbox.clone(),
            status: Arc::clone(&self.status),
        }
    }
}

impl<A: DeliveryApi> SyncHandle<A> {
    pub async fn queue_action(&self, action: SyncAction) -> EnqueueOutcome {
        let outcome = self.outbox.queue_action(action).await;
        self.refresh_pending().await;
        outcome
    }

    pub async fn capture_photo(
        &self,
        delivery_id: &str,
        photo_type: PhotoType,
        mime_type: &str,
        data: Vec<u8>,
    ) -> EnqueueOutcome {
        let outcome = self
            .outbox
            .capture_photo(delivery_id, photo_type, mime_type, data)
            .await;
        self.refresh_pending().await;
        outcome
    }

    async fn refresh_pending(&self) {
        match self.outbox.pending_count().await {
            Ok(pending) => {
                self.status.send_if_modified(|s| {
                    let changed = s.pending != pending;
                    s.pending = pending;
                    changed
                });
            }
            Err(e) => tracing::warn!("could not count pending actions: {}", e),
        }
    }
}

impl<A: DeliveryApi> ActionSink for SyncHandle<A> {
    async fn submit(&self, action: SyncAction) -> EnqueueOutcome {
        self.queue_action(action).await
    }
}

/// Sync engine coordinator
pub struct SyncEngine<A: DeliveryApi> {
    config: SyncConfig,
    monitor: NetworkMonitor,
    processor: SyncProcessor<A>,
    handle: SyncHandle<A>,
    reader: ReadThroughCache<A>,
    status: Arc<watch::Sender<SyncStatus>>,
    background_task: Option<JoinHandle<()>>,
}

impl<A: DeliveryApi> SyncEngine<A> {
    pub fn new(
        store: LocalDatabase,
        api: Arc<A>,
        monitor: NetworkMonitor,
        config: &SyncConfig,
    ) -> Self {
        let processor = SyncProcessor::new(
            store.clone(),
            Arc::clone(&api),
            RetryPolicy::from_config(config),
        );
        let outbox = Outbox::new(processor.clone(), monitor.clone());
        let reader = ReadThroughCache::new(api, store, monitor.clone());

        let (status, _) = watch::channel(SyncStatus {
            online: monitor.is_online(),
            ..SyncStatus::default()
        });
        let status = Arc::new(status);
        let handle = SyncHandle {
            outbox,
            status: Arc::clone(&status),
        };

        Self {
            config: config.clone(),
            monitor,
            processor,
            handle,
            reader,
            status,
            background_task: None,
        }
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// The bare outbox; writes through it do not refresh [`SyncStatus`]
    pub fn outbox(&self) -> &Outbox<A> {
        &self.handle.outbox
    }

    /// Status-aware sink for the location tracker and other producers
    pub fn sink(&self) -> SyncHandle<A> {
        self.handle.clone()
    }

    pub fn reader(&self) -> &ReadThroughCache<A> {
        &self.reader
    }

    pub fn store(&self) -> &LocalDatabase {
        self.processor.store()
    }

    /// Start the reconnect loop; a no-op when already running or when
    /// `auto_sync_on_reconnect` is off
    pub fn start(&mut self) {
        if self.is_running() {
            tracing::debug!("sync engine already running");
            return;
        }
        if !self.config.auto_sync_on_reconnect {
            tracing::info!("automatic sync disabled, drains only run on demand");
            return;
        }

        let events = self.monitor.subscribe();
        // Leftovers from an earlier session go out as soon as we are online.
        let drain_first = self.monitor.is_online();
        let handle = tokio::spawn(reconnect_loop(
            self.processor.clone(),
            self.monitor.clone(),
            Arc::clone(&self.status),
            events,
            drain_first,
        ));
        self.background_task = Some(handle);
        tracing::info!("sync engine started");
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
            tracing::info!("sync engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.background_task
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Submit a driver action through the outbox
    pub async fn queue_action(&self, action: SyncAction) -> EnqueueOutcome {
        self.handle.queue_action(action).await
    }

    /// Store a photo and submit its upload
    pub async fn capture_photo(
        &self,
        delivery_id: &str,
        photo_type: PhotoType,
        mime_type: &str,
        data: Vec<u8>,
    ) -> EnqueueOutcome {
        self.handle
            .capture_photo(delivery_id, photo_type, mime_type, data)
            .await
    }

    /// Drain now, regardless of the connectivity flag
    pub async fn sync_now(&self) -> DrainReport {
        run_drain(&self.processor, &self.status).await
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }
}

impl<A: DeliveryApi> Drop for SyncEngine<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_drain<A: DeliveryApi>(
    processor: &SyncProcessor<A>,
    status: &watch::Sender<SyncStatus>,
) -> DrainReport {
    status.send_modify(|s| s.syncing = true);

    let report = processor.drain().await;
    let pending = match processor.store().count(Collection::SyncQueue).await {
        Ok(pending) => Some(pending),
        Err(e) => {
            tracing::warn!("could not count pending actions: {}", e);
            None
        }
    };

    status.send_modify(|s| {
        s.syncing = false;
        s.last_sync = Some(Utc::now());
        s.last_report = Some(report);
        if let Some(pending) = pending {
            s.pending = pending;
        }
    });
    report
}

async fn reconnect_loop<A: DeliveryApi>(
    processor: SyncProcessor<A>,
    monitor: NetworkMonitor,
    status: Arc<watch::Sender<SyncStatus>>,
    mut events: broadcast::Receiver<NetworkEvent>,
    mut should_drain: bool,
) {
    let retry = processor.retry_policy().clone();
    let mut retry_at: Option<Instant> = None;

    loop {
        status.send_if_modified(|s| {
            let online = monitor.is_online();
            let changed = s.online != online;
            s.online = online;
            changed
        });

        if should_drain {
            let report = run_drain(&processor, &status).await;
            retry_at = (report.failed > report.dead_lettered)
                .then(|| Instant::now() + retry.delay_for(report.max_failed_attempts));
            if let Some(at) = retry_at {
                tracing::debug!(
                    in_secs = at.saturating_duration_since(Instant::now()).as_secs(),
                    "follow-up drain scheduled"
                );
            }
        }

        let deadline = retry_at;
        let retry_timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        should_drain = tokio::select! {
            event = events.recv() => match event {
                Ok(NetworkEvent::WentOnline) => true,
                Ok(NetworkEvent::WentOffline) => {
                    retry_at = None;
                    false
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "missed network events, rechecking");
                    monitor.is_online()
                }
                Err(RecvError::Closed) => break,
            },
            _ = retry_timer => {
                retry_at = None;
                monitor.is_online()
            }
        };
    }
}
