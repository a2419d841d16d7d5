//! # Photo Attachments
//!
//! Binary image data captured by the delivery flow. A photo stays in the
//! `photos` collection until its `photo_upload` action succeeds, then the
//! sync processor deletes it.

use crate::client::local_db::{Collection, LocalDatabase, Result, StoreIndex};
use crate::shared::PhotoType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Photo bytes awaiting upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoAttachment {
    /// Locally generated identifier
    pub id: String,
    pub delivery_id: String,
    pub photo_type: PhotoType,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl PhotoAttachment {
    pub fn new(
        delivery_id: impl Into<String>,
        photo_type: PhotoType,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            delivery_id: delivery_id.into(),
            photo_type,
            mime_type: mime_type.into(),
            data,
            captured_at: Utc::now(),
        }
    }

    /// File name sent with the multipart upload
    pub fn file_name(&self) -> String {
        let extension = match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        };
        format!("{}.{}", self.id, extension)
    }
}

impl LocalDatabase {
    /// Store a captured photo, returning its id
    pub async fn save_photo(&self, photo: &PhotoAttachment) -> Result<String> {
        self.put_as(Collection::Photos, photo, Some(&photo.id)).await
    }

    pub async fn get_photo(&self, photo_id: &str) -> Result<Option<PhotoAttachment>> {
        self.get_as(Collection::Photos, photo_id).await
    }

    pub async fn delete_photo(&self, photo_id: &str) -> Result<()> {
        self.delete(Collection::Photos, photo_id).await
    }

    pub async fn photos_for_delivery(&self, delivery_id: &str) -> Result<Vec<PhotoAttachment>> {
        self.get_all_by_index(Collection::Photos, StoreIndex::DeliveryId, delivery_id)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
