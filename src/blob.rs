//! Blob storage for report images.
//!
//! DESIGN
//! ======
//! Uploads go through the [`BlobStore`] trait so the report service does not
//! care whether bytes land on local disk or in an object-storage bucket.
//! Both backends return the public URL the report row should carry.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::BlobConfig;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob http error: {0}")]
    Http(String),
    #[error("blob rejected: {0}")]
    Rejected(String),
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at the relative `path`, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns a [`BlobError`] if the path is unsafe or the write fails.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;
}

/// Build the configured backend.
#[must_use]
pub fn from_config(config: &BlobConfig) -> Arc<dyn BlobStore> {
    match config {
        BlobConfig::Local { upload_dir, public_base_url } => {
            Arc::new(LocalBlobStore::new(upload_dir.clone(), public_base_url.clone()))
        }
        BlobConfig::Http { base_url, api_key, bucket } => {
            Arc::new(HttpBlobStore::new(base_url.clone(), api_key.clone(), bucket.clone()))
        }
    }
}

/// Only plain relative segments are accepted (`public/abc.png`).
pub(crate) fn validate_path(path: &str) -> Result<(), BlobError> {
    let p = Path::new(path);
    let plain = !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(BlobError::Rejected(format!("unsafe blob path: {path:?}")))
    }
}

// =============================================================================
// LOCAL
// =============================================================================

/// Files under `root`, exposed by the router at `/uploads`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    #[must_use]
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self { root, public_base_url }
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, BlobError> {
        validate_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path = %target.display(), "stored blob on disk");
        Ok(format!("{}/uploads/{path}", self.public_base_url))
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Object-storage REST API (`/storage/v1/object/{bucket}/{path}`).
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl HttpBlobStore {
    #[must_use]
    pub fn new(base_url: String, api_key: String, bucket: String) -> Self {
        Self { client: reqwest::Client::new(), base_url, api_key, bucket }
    }

    #[must_use]
    pub fn upload_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{path}", self.base_url, self.bucket)
    }

    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{path}", self.base_url, self.bucket)
    }
}

#[async_trait::async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        validate_path(path)?;
        let resp = self
            .client
            .post(self.upload_url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| BlobError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BlobError::Http(format!("{status}: {body}")));
        }
        Ok(self.public_url(path))
    }
}

#[cfg(test)]
#[path = "blob_test.rs"]
mod tests;
