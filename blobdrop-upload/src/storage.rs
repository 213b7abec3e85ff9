//! Storage collaborator trait and common types.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

use crate::{Result, TransferProgress, UploadError, UploadOptions};

/// Block size used for chunked uploads when none is configured (4 MiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Concurrent block uploads when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Largest payload sent in one request when none is configured (256 MiB).
pub const DEFAULT_MAX_SINGLE_SHOT_SIZE: u64 = 256 * 1024 * 1024;

/// Longest object name accepted by blob containers.
pub const MAX_OBJECT_NAME_LEN: usize = 1024;

/// Metadata about an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Object key within the container.
    pub key: String,
    /// Bytes stored.
    pub size: u64,
    /// Entity tag of the stored object.
    pub etag: Option<String>,
    /// Service request id of the committing call.
    pub request_id: Option<String>,
    /// SHA-256 hash of the payload.
    pub checksum: Option<String>,
    /// Object URL (if available).
    pub url: Option<String>,
    /// When the upload was committed.
    pub uploaded_at: SystemTime,
}

impl UploadResult {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            etag: None,
            request_id: None,
            checksum: None,
            url: None,
            uploaded_at: SystemTime::now(),
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Everything a backend needs for one transfer besides the key and bytes.
pub struct UploadRequest<'a> {
    /// Resolved option set.
    pub options: UploadOptions,
    /// Aborts the transfer when cancelled.
    pub signal: CancellationToken,
    /// MIME type of the payload, used when no header override is set.
    pub content_type: Option<String>,
    on_progress: &'a (dyn Fn(TransferProgress) + Send + Sync),
}

impl<'a> UploadRequest<'a> {
    pub fn new(
        options: UploadOptions,
        signal: CancellationToken,
        on_progress: &'a (dyn Fn(TransferProgress) + Send + Sync),
    ) -> Self {
        Self {
            options,
            signal,
            content_type: None,
            on_progress,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Report cumulative bytes sent for this object.
    pub fn report(&self, loaded_bytes: u64) {
        (self.on_progress)(TransferProgress::new(loaded_bytes));
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Fail with the cancellation kind when the signal has fired.
    pub fn ensure_active(&self, key: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(UploadError::cancelled(key));
        }
        Ok(())
    }

    pub fn block_size(&self) -> u64 {
        self.options.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    pub fn concurrency(&self) -> usize {
        self.options.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    pub fn max_single_shot_size(&self) -> u64 {
        self.options
            .max_single_shot_size
            .unwrap_or(DEFAULT_MAX_SINGLE_SHOT_SIZE)
    }

    /// Content type to store: the header override, else the guessed type.
    pub fn effective_content_type(&self) -> Option<&str> {
        self.options
            .headers
            .as_ref()
            .and_then(|h| h.content_type.as_deref())
            .or(self.content_type.as_deref())
    }
}

impl std::fmt::Debug for UploadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("options", &self.options)
            .field("cancelled", &self.signal.is_cancelled())
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Progress callback that drops every tick.
pub fn ignore_progress(_: TransferProgress) {}

/// Storage collaborator: uploads bytes to a named object.
///
/// Implementations must settle with [`UploadError::Cancelled`] once
/// `request.signal` fires mid-transfer, and may report progress zero or
/// more times before settling.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        request: UploadRequest<'_>,
    ) -> Result<UploadResult>;
}

/// Calculate SHA-256 checksum of data.
pub fn calculate_checksum(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Reject object names a blob container would refuse.
pub fn validate_object_name(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(UploadError::InvalidObjectName("empty name".into()));
    }
    if key.len() > MAX_OBJECT_NAME_LEN {
        return Err(UploadError::InvalidObjectName(format!(
            "name exceeds {} characters",
            MAX_OBJECT_NAME_LEN
        )));
    }
    if key.ends_with('/') || key.ends_with('.') {
        return Err(UploadError::InvalidObjectName(format!(
            "{} must not end with '/' or '.'",
            key
        )));
    }
    if key.chars().any(|c| c.is_control()) {
        return Err(UploadError::InvalidObjectName(format!(
            "{} contains control characters",
            key.escape_debug()
        )));
    }
    Ok(())
}
