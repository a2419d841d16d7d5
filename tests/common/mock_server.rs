//! Mock backends for integration tests
//!
//! [`MockApi`] is an in-process [`DeliveryApi`] that records every call and
//! fails on demand. [`http_api`] points the real reqwest client at a
//! wiremock server.

use fieldsync::client::api_client::{ApiError, ApiPath, DeliveryApi, HttpDeliveryApi};
use fieldsync::client::config::Config;
use fieldsync::client::local_db::PhotoAttachment;
use fieldsync::shared::{
    AppConfig, DeliveryStatus, LocationPing, PhotoType, PhotoUpload, SignatureCapture,
    StatusUpdate,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use wiremock::MockServer;

/// Remote call as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Status { delivery_id: String, status: DeliveryStatus },
    Photo { delivery_id: String, photo_type: PhotoType, bytes: Vec<u8> },
    Signature { delivery_id: String, signer_name: String },
    Location { latitude: f64, longitude: f64 },
    Fetch(String),
}

/// Scripted delivery backend
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<ApiCall>>,
    failing: Mutex<HashSet<String>>,
    documents: Mutex<HashMap<String, Value>>,
    unreachable: AtomicBool,
}

impl MockApi {
    /// Make every call for this delivery fail with a 503
    pub fn fail_delivery(&self, delivery_id: &str) {
        self.failing.lock().unwrap().insert(delivery_id.to_string());
    }

    pub fn recover_delivery(&self, delivery_id: &str) {
        self.failing.lock().unwrap().remove(delivery_id);
    }

    /// Fail every call, as if the host were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Serve `document` for GET `path`
    pub fn serve(&self, path: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(path.to_string(), document);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> Vec<(String, DeliveryStatus)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Status { delivery_id, status } => Some((delivery_id, status)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall, delivery_id: Option<&str>) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        if let Some(id) = delivery_id {
            if self.failing.lock().unwrap().contains(id) {
                return Err(ApiError::Rejected {
                    status: 503,
                    body: format!("delivery {} unavailable", id),
                });
            }
        }
        Ok(())
    }
}

impl DeliveryApi for MockApi {
    async fn update_status(&self, update: &StatusUpdate) -> Result<(), ApiError> {
        self.record(
            ApiCall::Status {
                delivery_id: update.delivery_id.clone(),
                status: update.status,
            },
            Some(&update.delivery_id),
        )
    }

    async fn upload_photo(
        &self,
        upload: &PhotoUpload,
        photo: &PhotoAttachment,
    ) -> Result<(), ApiError> {
        self.record(
            ApiCall::Photo {
                delivery_id: upload.delivery_id.clone(),
                photo_type: upload.photo_type,
                bytes: photo.data.clone(),
            },
            Some(&upload.delivery_id),
        )
    }

    async fn submit_signature(&self, signature: &SignatureCapture) -> Result<(), ApiError> {
        self.record(
            ApiCall::Signature {
                delivery_id: signature.delivery_id.clone(),
                signer_name: signature.signer_name.clone(),
            },
            Some(&signature.delivery_id),
        )
    }

    async fn report_location(&self, ping: &LocationPing) -> Result<(), ApiError> {
        self.record(
            ApiCall::Location {
                latitude: ping.latitude,
                longitude: ping.longitude,
            },
            None,
        )
    }

    async fn fetch_json(&self, path: &ApiPath) -> Result<Value, ApiError> {
        let path = path.to_string();
        self.record(ApiCall::Fetch(path.clone()), None)?;
        self.documents
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .ok_or(ApiError::Rejected {
                status: 404,
                body: "not found".to_string(),
            })
    }
}

/// Real HTTP client aimed at a wiremock server
pub fn http_api(server: &MockServer, token: Option<&str>) -> HttpDeliveryApi {
    let app = AppConfig::builder()
        .server_url(server.uri())
        .build()
        .expect("wiremock uri is a valid server url");
    let mut config = Config::from_app(app);
    config.set_token(token.map(str::to_string));
    HttpDeliveryApi::new(config).expect("Failed to build HTTP client")
}
