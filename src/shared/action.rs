//! Queued Action Types
//!
//! The unit of durable work in the outbox. A [`SyncAction`] is the
//! side effect itself; a [`QueuedAction`] wraps it with the bookkeeping the
//! outbox persists (insertion key, creation time, attempt counter).
//!
//! Serialized form inside the `sync_queue` collection:
//!
//! ```json
//! {
//!   "id": 7,
//!   "action": { "type": "status_update", "delivery_id": "d-1", "status": "delivered", ... },
//!   "created_at": "2026-10-16T09:30:00Z",
//!   "attempts": 0
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery lifecycle status reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Arrived,
    Delivered,
    Failed,
    Returned,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Arrived => "arrived",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Returned => "returned",
        }
    }
}

/// What a captured photo documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoType {
    ProofOfDelivery,
    Damage,
    Location,
    Other,
}

impl PhotoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoType::ProofOfDelivery => "proof_of_delivery",
            PhotoType::Damage => "damage",
            PhotoType::Location => "location",
            PhotoType::Other => "other",
        }
    }
}

/// Status change for a delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub delivery_id: String,
    pub status: DeliveryStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Upload of a photo kept in the `photos` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoUpload {
    /// Key of the attachment in the local store
    pub photo_id: String,
    pub delivery_id: String,
    pub photo_type: PhotoType,
}

/// Recipient signature for a delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureCapture {
    pub delivery_id: String,
    pub signer_name: String,
    /// Signature image as a `data:image/png;base64,...` URL
    pub image_data: String,
    pub timestamp: DateTime<Utc>,
}

/// Driver position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPing {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
    /// Horizontal accuracy in whole meters
    pub accuracy_m: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Side-effecting operation awaiting delivery to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncAction {
    StatusUpdate(StatusUpdate),
    PhotoUpload(PhotoUpload),
    Signature(SignatureCapture),
    LocationPing(LocationPing),
    /// Record written by a build that knows more action types than this one
    #[serde(other)]
    Unknown,
}

impl SyncAction {
    /// Discriminant as written to the store
    pub fn type_name(&self) -> &'static str {
        match self {
            SyncAction::StatusUpdate(_) => "status_update",
            SyncAction::PhotoUpload(_) => "photo_upload",
            SyncAction::Signature(_) => "signature",
            SyncAction::LocationPing(_) => "location_ping",
            SyncAction::Unknown => "unknown",
        }
    }
}

/// Durable outbox entry
///
/// Only `attempts` ever changes after the entry is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Insertion key, assigned by the store on first write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub action: SyncAction,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedAction {
    pub fn new(action: SyncAction) -> Self {
        Self {
            id: None,
            action,
            created_at: Utc::now(),
            attempts: 0,
        }
    }
}
