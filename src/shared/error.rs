//! Shared Error Types
//!
//! Error taxonomy for the sync engine. Layer-specific errors
//! (`StoreError`, `ApiError`, `PositionError`) live next to the code that
//! produces them and convert into [`SyncError`] when a queued action is
//! executed.
//!
//! # Error Categories
//!
//! - `Storage` - the local store is unavailable (quota, corruption, closed pool)
//! - `Api` - transport failure or a non-success HTTP status from the backend
//! - `MissingAttachment` - a photo upload references bytes that are gone
//! - `UnknownActionType` - a queue record whose `type` this build does not know
//!
//! None of these are fatal. The sync processor absorbs every one of them:
//! retryable failures bump the `attempts` counter, the rest are dropped.
use thiserror::Error;

use crate::client::api_client::ApiError;
use crate::client::local_db::StoreError;

/// Failure while executing a queued action
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store could not be read or written
    #[error("storage unavailable: {0}")]
    Storage(#[from] StoreError),

    /// Remote call failed (transport or HTTP status)
    #[error("remote call failed: {0}")]
    Api(#[from] ApiError),

    /// Photo upload whose attachment is no longer in the store
    #[error("attachment {photo_id} not found in local store")]
    MissingAttachment {
        /// Locally generated attachment id
        photo_id: String,
    },

    /// Queue entry with a `type` this build cannot dispatch
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),
}

impl SyncError {
    /// Whether a later retry could succeed.
    ///
    /// Unknown action types never become known to this build, so they are
    /// dropped instead of retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnknownActionType(_))
    }
}
