//! # Sync Processor
//!
//! Executes queued actions against the backend and drains the outbox.
//!
//! Drain policy:
//! - entries are processed in insertion order
//! - success deletes the entry
//! - failure increments `attempts` by one and leaves the entry queued
//! - one failing entry never stops the pass
//! - unknown or undecodable entries are logged and dropped
//!
//! Concurrent `drain()` calls are coalesced: a caller arriving while a pass
//! is in flight awaits that pass instead of starting a second one.

use crate::client::api_client::DeliveryApi;
use crate::client::local_db::{Collection, LocalDatabase};
use crate::client::offline::retry::RetryPolicy;
use crate::shared::{QueuedAction, SyncAction, SyncError};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

type InFlightDrain = Shared<BoxFuture<'static, DrainReport>>;

/// Result of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Delivered and removed from the queue
    pub synced: usize,
    /// Failed this pass and still queued (or dead-lettered)
    pub failed: usize,
    /// Unknown or malformed entries removed without delivery
    pub dropped: usize,
    /// Entries moved to `dead_letters` this pass
    pub dead_lettered: usize,
    /// Highest `attempts` value among entries that failed this pass
    pub max_failed_attempts: u32,
}

/// Delivers queued actions through a [`DeliveryApi`]
pub struct SyncProcessor<A> {
    store: LocalDatabase,
    api: Arc<A>,
    retry: RetryPolicy,
    in_flight: Arc<Mutex<Option<InFlightDrain>>>,
}

impl<A> Clone for SyncProcessor<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            api: Arc::clone(&self.api),
            retry: self.retry.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<A: DeliveryApi> SyncProcessor<A> {
    pub fn new(store: LocalDatabase, api: Arc<A>, retry: RetryPolicy) -> Self {
        Self {
            store,
            api,
            retry,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &LocalDatabase {
        &self.store
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Perform the remote side effect of one action
    pub async fn execute_action(&self, action: &SyncAction) -> Result<(), SyncError> {
        match action {
            SyncAction::StatusUpdate(update) => self.api.update_status(update).await?,
            SyncAction::PhotoUpload(upload) => {
                let photo = self
                    .store
                    .get_photo(&upload.photo_id)
                    .await?
                    .ok_or_else(|| SyncError::MissingAttachment {
                        photo_id: upload.photo_id.clone(),
                    })?;

                self.api.upload_photo(upload, &photo).await?;

                // The upload is confirmed; a leftover local copy is only wasted space.
                if let Err(e) = self.store.delete_photo(&upload.photo_id).await {
                    tracing::warn!(photo_id = %upload.photo_id, "could not delete uploaded photo: {}", e);
                }
            }
            SyncAction::Signature(signature) => self.api.submit_signature(signature).await?,
            SyncAction::LocationPing(ping) => self.api.report_location(ping).await?,
            SyncAction::Unknown => {
                return Err(SyncError::UnknownActionType(action.type_name().to_string()))
            }
        }
        Ok(())
    }

    /// Deliver every queued action once; see module docs for the policy
    pub async fn drain(&self) -> DrainReport {
        let pass = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(pass) => {
                    tracing::debug!("joining drain already in flight");
                    pass.clone()
                }
                None => {
                    let this = self.clone();
                    let pass = async move {
                        let report = this.drain_pass().await;
                        this.in_flight.lock().await.take();
                        report
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pass.clone());
                    pass
                }
            }
        };

        pass.await
    }

    async fn drain_pass(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let entries = match self.store.get_all_entries(Collection::SyncQueue).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("cannot read sync queue: {}", e);
                return report;
            }
        };

        if entries.is_empty() {
            return report;
        }

        tracing::info!(count = entries.len(), "draining sync queue");

        for (key, record) in entries {
            self.process_record(&key, record, &mut report).await;
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            dropped = report.dropped,
            "drain finished"
        );
        report
    }

    /// Entries are addressed by their store key, never by the `id` they carry
    async fn process_record(&self, key: &str, record: Value, report: &mut DrainReport) {
        let raw_type = record
            .pointer("/action/type")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();

        let mut queued: QueuedAction = match serde_json::from_value(record) {
            Ok(queued) => queued,
            Err(e) => {
                tracing::error!(action_id = %key, "dropping malformed queue record: {}", e);
                self.remove(key).await;
                report.dropped += 1;
                return;
            }
        };

        match self.execute_action(&queued.action).await {
            Ok(()) => {
                tracing::debug!(action_id = %key, action_type = %raw_type, "action synced");
                self.remove(key).await;
                report.synced += 1;
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(action_id = %key, action_type = %raw_type, "dropping action: {}", e);
                self.remove(key).await;
                report.dropped += 1;
            }
            Err(e) => {
                queued.attempts += 1;
                report.failed += 1;
                report.max_failed_attempts = report.max_failed_attempts.max(queued.attempts);

                tracing::warn!(
                    action_id = %key,
                    action_type = %raw_type,
                    attempts = queued.attempts,
                    "action failed, keeping it queued: {}",
                    e
                );

                if self.retry.is_exhausted(queued.attempts) && self.dead_letter(key, &queued).await {
                    report.dead_lettered += 1;
                } else {
                    self.record_attempt(key, &queued).await;
                }
            }
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.store.delete(Collection::SyncQueue, key).await {
            tracing::error!(action_id = %key, "could not remove queue entry: {}", e);
        }
    }

    async fn record_attempt(&self, key: &str, queued: &QueuedAction) {
        let value = match serde_json::to_value(queued) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(action_id = %key, "could not encode queue entry: {}", e);
                return;
            }
        };

        match self.store.update(Collection::SyncQueue, key, &value).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(action_id = %key, "entry already removed by another pass"),
            Err(e) => tracing::error!(action_id = %key, "could not persist attempt count: {}", e),
        }
    }

    /// Move an exhausted entry to `dead_letters`; false leaves it queued
    async fn dead_letter(&self, key: &str, queued: &QueuedAction) -> bool {
        if let Err(e) = self
            .store
            .put_as(Collection::DeadLetters, queued, Some(key))
            .await
        {
            tracing::error!(action_id = %key, "could not dead-letter entry: {}", e);
            return false;
        }

        tracing::error!(
            action_id = %key,
            attempts = queued.attempts,
            "giving up on action, moved to dead letters"
        );
        self.remove(key).await;
        true
    }
}
