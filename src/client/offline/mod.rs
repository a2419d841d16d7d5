//! # Offline Module
//!
//! Write path of the offline engine. Every side effect the driver triggers
//! goes through [`Outbox::queue_action`]:
//!
//! 1. online: try the call right away; success means nothing is persisted
//! 2. offline, or the immediate call failed: append to `sync_queue`
//! 3. the sync processor drains the queue on reconnect
//!
//! Reads go through [`read_through::ReadThroughCache`], which serves the
//! last network snapshot when the backend cannot be reached.

pub mod read_through;
pub mod retry;

pub use read_through::{CachedRead, ReadSource, ReadThroughCache};
pub use retry::RetryPolicy;

use crate::client::api_client::DeliveryApi;
use crate::client::local_db::{Collection, LocalDatabase, PhotoAttachment, StoreError};
use crate::client::sync::network_monitor::NetworkMonitor;
use crate::client::sync::processor::{DrainReport, SyncProcessor};
use crate::shared::{PhotoType, PhotoUpload, QueuedAction, SyncAction};
use std::future::Future;

/// What happened to a submitted action
///
/// Both flags false means the action was lost: the immediate call did not
/// happen or failed, and the queue write failed too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// Delivered immediately, nothing persisted
    pub synced: bool,
    /// Persisted to the outbox for a later drain
    pub queued: bool,
}

impl EnqueueOutcome {
    pub const SYNCED: Self = Self { synced: true, queued: false };
    pub const QUEUED: Self = Self { synced: false, queued: true };
    pub const LOST: Self = Self { synced: false, queued: false };

    /// The action is either done or durably pending
    pub fn is_accepted(&self) -> bool {
        self.synced || self.queued
    }
}

/// Anything that takes actions for eventual delivery
///
/// The location reporter writes through this seam so it can run against a
/// recording sink in tests.
pub trait ActionSink: Send + Sync + 'static {
    fn submit(&self, action: SyncAction) -> impl Future<Output = EnqueueOutcome> + Send;
}

/// Durable outbox in front of the delivery API
pub struct Outbox<A> {
    processor: SyncProcessor<A>,
    monitor: NetworkMonitor,
}

impl<A> Clone for Outbox<A> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl<A: DeliveryApi> Outbox<A> {
    pub fn new(processor: SyncProcessor<A>, monitor: NetworkMonitor) -> Self {
        Self { processor, monitor }
    }

    fn store(&self) -> &LocalDatabase {
        self.processor.store()
    }

    /// Try the action now when online, otherwise queue it
    pub async fn queue_action(&self, action: SyncAction) -> EnqueueOutcome {
        if matches!(action, SyncAction::Unknown) {
            tracing::warn!("refusing to queue an action of unknown type");
            return EnqueueOutcome::LOST;
        }

        if self.monitor.is_online() {
            match self.processor.execute_action(&action).await {
                Ok(()) => {
                    tracing::debug!(action_type = action.type_name(), "action synced immediately");
                    return EnqueueOutcome::SYNCED;
                }
                Err(e) => {
                    tracing::info!(
                        action_type = action.type_name(),
                        "immediate sync failed, queueing: {}",
                        e
                    );
                }
            }
        }

        self.persist(QueuedAction::new(action)).await
    }

    async fn persist(&self, queued: QueuedAction) -> EnqueueOutcome {
        let action_type = queued.action.type_name();
        match self.store().put_as(Collection::SyncQueue, &queued, None).await {
            Ok(key) => {
                tracing::debug!(action_id = %key, action_type, "action queued");
                EnqueueOutcome::QUEUED
            }
            Err(e) => {
                tracing::error!(action_type, "could not queue action, it is lost: {}", e);
                EnqueueOutcome::LOST
            }
        }
    }

    /// Store a captured photo and submit its upload
    ///
    /// The bytes stay in `photos` until the upload succeeds.
    pub async fn capture_photo(
        &self,
        delivery_id: &str,
        photo_type: PhotoType,
        mime_type: &str,
        data: Vec<u8>,
    ) -> EnqueueOutcome {
        let photo = PhotoAttachment::new(delivery_id, photo_type, mime_type, data);
        if let Err(e) = self.store().save_photo(&photo).await {
            tracing::error!(delivery_id, "could not store photo: {}", e);
            return EnqueueOutcome::LOST;
        }

        self.queue_action(SyncAction::PhotoUpload(PhotoUpload {
            photo_id: photo.id,
            delivery_id: delivery_id.to_string(),
            photo_type,
        }))
        .await
    }

    /// Drain the queue now; see [`SyncProcessor::drain`]
    pub async fn process_queue(&self) -> DrainReport {
        self.processor.drain().await
    }

    pub async fn pending_count(&self) -> Result<u64, StoreError> {
        self.store().count(Collection::SyncQueue).await
    }

    /// Queued actions in insertion order; undecodable records are skipped
    pub async fn pending(&self) -> Result<Vec<QueuedAction>, StoreError> {
        self.decode_all(Collection::SyncQueue).await
    }

    /// Actions the processor gave up on
    pub async fn dead_letters(&self) -> Result<Vec<QueuedAction>, StoreError> {
        self.decode_all(Collection::DeadLetters).await
    }

    async fn decode_all(&self, collection: Collection) -> Result<Vec<QueuedAction>, StoreError> {
        let records = self.store().get_all(collection).await?;
        Ok(records
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(queued) => Some(queued),
                Err(e) => {
                    tracing::warn!(collection = collection.name(), "skipping undecodable record: {}", e);
                    None
                }
            })
            .collect())
    }
}

impl<A: DeliveryApi> ActionSink for Outbox<A> {
    async fn submit(&self, action: SyncAction) -> EnqueueOutcome {
        self.queue_action(action).await
    }
}
