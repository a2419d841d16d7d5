//! Delivery API Client
//!
//! The backend is an opaque collaborator. [`DeliveryApi`] is the seam the
//! sync processor and the read-through cache talk to; [`HttpDeliveryApi`]
//! is the reqwest implementation used in production.
//!
//! | Call | Request |
//! |---|---|
//! | `update_status` | `PATCH /api/deliveries/{id}/status` (JSON) |
//! | `upload_photo` | `POST /api/deliveries/{id}/photos` (multipart) |
//! | `submit_signature` | `POST /api/deliveries/{id}/signature` (JSON) |
//! | `report_location` | `POST /api/driver/location` (JSON) |
//! | `fetch_json` | `GET {path}` |
//!
//! Paths are built from raw segments through [`ApiPath`], so ids and query
//! values are percent-encoded exactly once, when the URL is assembled.

use crate::client::config::Config;
use crate::client::local_db::PhotoAttachment;
use crate::shared::{LocationPing, PhotoUpload, SignatureCapture, StatusUpdate};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Client-side bound on a single request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote call failures
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: DNS, connect, TLS, timeout
    #[error("network unavailable: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success status other than 401
    #[error("server rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 401 from the backend
    #[error("session expired")]
    SessionExpired,

    /// Configured server URL cannot carry a request path
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

/// Request target relative to the server URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl ApiPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Absolute URL under `base`; keeps any path prefix `base` already has
    pub fn to_url(&self, base: &str) -> Result<Url, ApiError> {
        let mut url =
            Url::parse(base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;

        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(base.to_string()))?
            .pop_if_empty()
            .extend(&self.segments);

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

/// Unencoded form, for logs
impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        for (i, (key, value)) in self.query.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { '?' } else { '&' }, key, value)?;
        }
        Ok(())
    }
}

/// Remote operations the sync engine depends on
pub trait DeliveryApi: Send + Sync + 'static {
    fn update_status(
        &self,
        update: &StatusUpdate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn upload_photo(
        &self,
        upload: &PhotoUpload,
        photo: &PhotoAttachment,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn submit_signature(
        &self,
        signature: &SignatureCapture,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn report_location(
        &self,
        ping: &LocationPing,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// GET a JSON document for the read-through cache
    fn fetch_json(&self, path: &ApiPath)
        -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// reqwest-backed [`DeliveryApi`]
#[derive(Debug, Clone)]
pub struct HttpDeliveryApi {
    config: Config,
    client: Client,
}

impl HttpDeliveryApi {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn endpoint(&self, path: &ApiPath) -> Result<Url, ApiError> {
        path.to_url(self.config.server_url())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.get_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorized(request).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::SessionExpired);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Rejected {
        status: status.as_u16(),
        body,
    })
}

impl DeliveryApi for HttpDeliveryApi {
    async fn update_status(&self, update: &StatusUpdate) -> Result<(), ApiError> {
        let url = self.endpoint(&ApiPath::new([
            "api",
            "deliveries",
            update.delivery_id.as_str(),
            "status",
        ]))?;

        let body = json!({
            "status": update.status,
            "latitude": update.latitude,
            "longitude": update.longitude,
            "notes": update.notes,
            "timestamp": update.timestamp,
        });

        self.send(self.client.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn upload_photo(
        &self,
        upload: &PhotoUpload,
        photo: &PhotoAttachment,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&ApiPath::new([
            "api",
            "deliveries",
            upload.delivery_id.as_str(),
            "photos",
        ]))?;

        let part = Part::bytes(photo.data.clone())
            .file_name(photo.file_name())
            .mime_str(&photo.mime_type)?;

        let form = Form::new()
            .text("delivery_id", upload.delivery_id.clone())
            .text("photo_type", upload.photo_type.as_str())
            .part("photo", part);

        self.send(self.client.post(url).multipart(form)).await?;
        Ok(())
    }

    async fn submit_signature(&self, signature: &SignatureCapture) -> Result<(), ApiError> {
        let url = self.endpoint(&ApiPath::new([
            "api",
            "deliveries",
            signature.delivery_id.as_str(),
            "signature",
        ]))?;

        let body = json!({
            "signer_name": signature.signer_name,
            "signature": signature.image_data,
            "timestamp": signature.timestamp,
        });

        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn report_location(&self, ping: &LocationPing) -> Result<(), ApiError> {
        let url = self.endpoint(&ApiPath::new(["api", "driver", "location"]))?;
        self.send(self.client.post(url).json(ping)).await?;
        Ok(())
    }

    async fn fetch_json(&self, path: &ApiPath) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }
}
