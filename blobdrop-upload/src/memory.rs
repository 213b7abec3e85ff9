//! In-process blob storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::{
    AccessTier, BlobHttpHeaders, BlobStore, Result, UploadError, UploadRequest, UploadResult,
    WriteConditions, calculate_checksum, validate_object_name,
};

/// An object held by [`MemoryBlobStore`].
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub etag: String,
    pub content_type: Option<String>,
    pub headers: Option<BlobHttpHeaders>,
    pub metadata: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub tier: Option<AccessTier>,
    pub encryption_scope: Option<String>,
    /// Blocks staged to build the object; 0 for single-shot writes.
    pub block_count: usize,
    pub uploaded_at: SystemTime,
}

/// Container kept in memory.
///
/// Payloads above the single-shot threshold are staged block by block,
/// yielding to the runtime and checking the cancellation signal between
/// blocks, so cancellation and progress behave like a remote transfer.
pub struct MemoryBlobStore {
    container: String,
    objects: RwLock<HashMap<String, StoredBlob>>,
    next_etag: AtomicU64,
    max_object_size: Option<u64>,
}

impl MemoryBlobStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            objects: RwLock::new(HashMap::new()),
            next_etag: AtomicU64::new(1),
            max_object_size: None,
        }
    }

    /// Refuse payloads larger than `limit` bytes.
    pub fn with_max_object_size(mut self, limit: u64) -> Self {
        self.max_object_size = Some(limit);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// URL an object is reported under.
    pub fn url(&self, key: &str) -> String {
        format!("memory://{}/{}", self.container, key)
    }

    /// Stored bytes for a key.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|blob| blob.data.clone())
    }

    /// Stored object with its properties.
    pub fn object(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().get(key).cloned()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Tag predicates and leases have no in-memory counterpart and are refused.
    fn check_supported(key: &str, conditions: Option<&WriteConditions>) -> Result<()> {
        let Some(conditions) = conditions else {
            return Ok(());
        };

        if conditions.if_tags.is_some() {
            return Err(UploadError::Config(format!(
                "{}: tag conditions are not supported by the memory store",
                key
            )));
        }
        if conditions.lease_id.is_some() {
            return Err(UploadError::Config(format!(
                "{}: leases are not supported by the memory store",
                key
            )));
        }

        Ok(())
    }

    fn check_conditions(
        key: &str,
        existing: Option<&StoredBlob>,
        conditions: Option<&WriteConditions>,
    ) -> Result<()> {
        let Some(conditions) = conditions else {
            return Ok(());
        };

        if let Some(expected) = &conditions.if_none_match {
            match existing {
                Some(_) if expected == "*" => {
                    return Err(UploadError::ConditionNotMet(format!("{} already exists", key)));
                }
                Some(blob) if &blob.etag == expected => {
                    return Err(UploadError::ConditionNotMet(format!(
                        "{} still has etag {}",
                        key, expected
                    )));
                }
                _ => {}
            }
        }

        if let Some(expected) = &conditions.if_match {
            match existing {
                None => {
                    return Err(UploadError::ConditionNotMet(format!("{} does not exist", key)));
                }
                Some(blob) if expected != "*" && &blob.etag != expected => {
                    return Err(UploadError::ConditionNotMet(format!(
                        "{} has etag {}, expected {}",
                        key, blob.etag, expected
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Stage `data` in blocks, reporting cumulative progress per block.
    async fn stage_blocks(
        &self,
        key: &str,
        data: &Bytes,
        request: &UploadRequest<'_>,
    ) -> Result<usize> {
        let block_size = request.block_size().max(1) as usize;
        let mut staged = 0u64;
        let mut blocks = 0usize;

        for block in data.chunks(block_size) {
            request.ensure_active(key)?;
            tokio::task::yield_now().await;
            request.ensure_active(key)?;

            staged += block.len() as u64;
            blocks += 1;
            debug!(key = %key, block = blocks, staged, "Staged block");
            request.report(staged);
        }

        Ok(blocks)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        request: UploadRequest<'_>,
    ) -> Result<UploadResult> {
        validate_object_name(key)?;

        let size = data.len() as u64;
        if let Some(limit) = self.max_object_size {
            if size > limit {
                return Err(UploadError::TooLarge { size, limit });
            }
        }

        Self::check_supported(key, request.options.conditions.as_ref())?;
        request.ensure_active(key)?;

        let block_count = if size > request.max_single_shot_size() {
            let blocks = self.stage_blocks(key, &data, &request).await?;
            request.ensure_active(key)?;
            blocks
        } else {
            tokio::task::yield_now().await;
            request.ensure_active(key)?;
            0
        };

        let options = &request.options;
        let etag = format!("\"0x{:X}\"", self.next_etag.fetch_add(1, Ordering::Relaxed));
        let blob = StoredBlob {
            etag: etag.clone(),
            content_type: request.effective_content_type().map(String::from),
            headers: options.headers.clone(),
            metadata: options.metadata.clone().unwrap_or_default(),
            tags: options.tags.clone().unwrap_or_default(),
            tier: options.tier,
            encryption_scope: options.encryption_scope.clone(),
            block_count,
            uploaded_at: SystemTime::now(),
            data,
        };

        let checksum = calculate_checksum(&blob.data);
        let uploaded_at = blob.uploaded_at;

        {
            let mut objects = self.objects.write();
            Self::check_conditions(key, objects.get(key), options.conditions.as_ref())?;
            objects.insert(key.to_string(), blob);
        }

        if block_count == 0 {
            request.report(size);
        }

        info!(
            container = %self.container,
            key = %key,
            size,
            blocks = block_count,
            "Stored blob in memory"
        );

        let mut result = UploadResult::new(key, size)
            .with_etag(etag)
            .with_request_id(uuid::Uuid::new_v4().to_string())
            .with_checksum(checksum)
            .with_url(self.url(key));
        result.uploaded_at = uploaded_at;

        Ok(result)
    }
}
