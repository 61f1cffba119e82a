//! Content store client.
//!
//! The file bytes never touch the ledger; they go to an external
//! content-addressed store that hands back an opaque identifier. Upload is
//! deliberately one-shot: a failure whose outcome is unknown (the remote
//! may already have accepted the bytes) is reported as such and never
//! silently retried, so the caller decides whether a duplicate is
//! acceptable. Retrieval goes through a public gateway URL.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Errors from the content store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid content store endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("content upload rejected (status {status}): {message}")]
    UploadRejected { status: u16, message: String },
    #[error("content upload outcome unknown, the store may have kept the bytes: {0}")]
    OutcomeUnknown(String),
    #[error("store returned an empty content identifier")]
    EmptyContentId,
}

/// Seam over the external content-addressed store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store the bytes and return their content identifier.
    async fn upload(&self, bytes: &[u8]) -> Result<String, StoreError>;

    /// Public gateway URL from which the content can be fetched.
    fn gateway_url(&self, content_id: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// HTTP client for a hosted content-addressed store.
#[derive(Clone, Debug)]
pub struct HttpContentStore {
    endpoint: Url,
    api_key: String,
    gateway_base: String,
    http: reqwest::Client,
}

impl HttpContentStore {
    pub fn new(
        endpoint: impl AsRef<str>,
        api_key: impl Into<String>,
        gateway_base: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint.as_ref())
            .map_err(|_| StoreError::InvalidEndpoint(endpoint.as_ref().to_string()))?;
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            gateway_base: gateway_base.into(),
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn upload(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            // The request may have reached the remote before the failure;
            // the caller must know a duplicate is possible.
            .map_err(|err| StoreError::OutcomeUnknown(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::UploadRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<UploadResponse>()
            .await
            .map_err(|err| StoreError::OutcomeUnknown(err.to_string()))?;
        if body.hash.is_empty() {
            return Err(StoreError::EmptyContentId);
        }
        Ok(body.hash)
    }

    fn gateway_url(&self, content_id: &str) -> String {
        join_gateway(&self.gateway_base, content_id)
    }
}

/// In-memory content-addressed store for tests and offline use.
#[derive(Clone)]
pub struct MemoryContentStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    gateway_base: String,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            gateway_base: "memory://content".to_string(),
        }
    }

    /// Fetch stored bytes by identifier.
    pub fn get(&self, content_id: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(content_id).cloned()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        // Reuse the address alphabet for memory-store identifiers.
        let content_id = chaindrive_types::Address::from_bytes(digest).to_string();
        self.blobs.write().insert(content_id.clone(), bytes.to_vec());
        Ok(content_id)
    }

    fn gateway_url(&self, content_id: &str) -> String {
        join_gateway(&self.gateway_base, content_id)
    }
}

fn join_gateway(base: &str, content_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), content_id)
}
