//! Azure Blob Storage backend.

use async_trait::async_trait;
use azure_core::StatusCode;
use azure_core::error::ErrorKind;
use azure_core::request_options::{IfMatchCondition, IfTags, LeaseId, Metadata};
use azure_storage::CloudLocation;
use azure_storage::prelude::*;
use azure_storage_blobs::prelude::*;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info};
use url::Url;

use crate::{
    AccessTier, BlobStore, Result, UploadError, UploadOptions, UploadRequest, UploadResult,
    UploaderConfig, calculate_checksum, validate_object_name,
};

/// Apply content headers, metadata, tags, tier and write conditions to a
/// `put_block_blob` or `put_block_list` builder.
///
/// Neither call accepts `Cache-Control`; it is set once the blob is committed.
macro_rules! apply_commit_options {
    ($builder:ident, $request:expr) => {{
        let options: &UploadOptions = &$request.options;

        if let Some(content_type) = $request.effective_content_type() {
            $builder = $builder.content_type(content_type.to_string());
        }
        if let Some(headers) = &options.headers {
            if let Some(value) = &headers.content_encoding {
                $builder = $builder.content_encoding(value.clone());
            }
            if let Some(value) = &headers.content_language {
                $builder = $builder.content_language(value.clone());
            }
            if let Some(value) = &headers.content_disposition {
                $builder = $builder.content_disposition(value.clone());
            }
        }
        if let Some(metadata) = &options.metadata {
            let mut blob_metadata = Metadata::new();
            for (key, value) in metadata {
                blob_metadata.insert(key.clone(), value.clone());
            }
            $builder = $builder.metadata(blob_metadata);
        }
        if let Some(tags) = &options.tags {
            let mut blob_tags = Tags::new();
            for (key, value) in tags {
                blob_tags.insert(key.clone(), value.clone());
            }
            $builder = $builder.tags(blob_tags);
        }
        if let Some(tier) = options.tier {
            $builder = $builder.access_tier(access_tier(tier));
        }
        if let Some(conditions) = &options.conditions {
            if let Some(etag) = &conditions.if_match {
                $builder = $builder.if_match(IfMatchCondition::Match(etag.clone()));
            } else if let Some(etag) = &conditions.if_none_match {
                $builder = $builder.if_match(IfMatchCondition::NotMatch(etag.clone()));
            }
            if let Some(predicate) = &conditions.if_tags {
                $builder = $builder.if_tags(IfTags::new(predicate.clone()));
            }
        }
        if let Some(lease) = lease_id(options)? {
            $builder = $builder.lease_id(lease);
        }
    }};
}

/// Container addressed through a blob service endpoint and a SAS token.
pub struct AzureBlobStore {
    container_client: ContainerClient,
    endpoint: String,
    container: String,
}

impl AzureBlobStore {
    /// Connect to `container` under `endpoint` with a shared access signature.
    ///
    /// The account name is the first label of the endpoint host, or the first
    /// path segment for emulator-style endpoints such as
    /// `http://127.0.0.1:10000/devstoreaccount1`.
    pub fn from_sas(endpoint: &str, sas: &str, container: impl Into<String>) -> Result<Self> {
        let container = container.into();
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let account = account_from_endpoint(&endpoint)?;

        let credentials = StorageCredentials::sas_token(sas.trim_start_matches('?'))
            .map_err(|e| UploadError::Config(format!("invalid SAS token: {}", e)))?;

        let location = CloudLocation::Custom {
            account: account.clone(),
            uri: endpoint.clone(),
        };
        let container_client =
            ClientBuilder::with_location(location, credentials).container_client(&container);

        info!(
            account = %account,
            container = %container,
            "Initialized Azure Blob storage"
        );

        Ok(Self {
            container_client,
            endpoint,
            container,
        })
    }

    /// Connect using an uploader configuration.
    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Self::from_sas(&config.endpoint, &config.sas, config.container.clone())
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Public URL of a blob (without credentials).
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.container, key)
    }

    async fn put_single_shot(
        &self,
        blob: &BlobClient,
        key: &str,
        data: Bytes,
        request: &UploadRequest<'_>,
    ) -> Result<(String, String)> {
        let mut builder = blob.put_block_blob(data);
        apply_commit_options!(builder, request);
        if let Some(scope) = &request.options.encryption_scope {
            builder = builder.encryption_scope(scope.clone());
        }

        let response = tokio::select! {
            biased;
            _ = request.signal.cancelled() => return Err(UploadError::cancelled(key)),
            response = builder.into_future() => response.map_err(|e| map_azure_error(key, e))?,
        };

        Ok((response.etag, response.request_id.to_string()))
    }

    async fn put_blocks(
        &self,
        blob: &BlobClient,
        key: &str,
        data: Bytes,
        request: &UploadRequest<'_>,
    ) -> Result<(String, String)> {
        check_block_options(key, &request.options)?;

        let block_size = request.block_size().max(1) as usize;
        let total = data.len();

        let blocks: Vec<(BlockId, Bytes)> = (0..total)
            .step_by(block_size)
            .enumerate()
            .map(|(index, start)| {
                let end = (start + block_size).min(total);
                (block_id(index), data.slice(start..end))
            })
            .collect();

        let block_list = BlockList {
            blocks: blocks
                .iter()
                .map(|(id, _)| BlobBlockType::new_uncommitted(id.clone()))
                .collect(),
        };

        debug!(key = %key, blocks = blocks.len(), block_size, "Staging blocks");

        let mut staging = futures::stream::iter(blocks.into_iter().map(|(id, chunk)| {
            let blob = blob.clone();
            async move {
                let len = chunk.len() as u64;
                blob.put_block(id, chunk).into_future().await.map(|_| len)
            }
        }))
        .buffer_unordered(request.concurrency().max(1));

        let mut staged = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = request.signal.cancelled() => return Err(UploadError::cancelled(key)),
                next = staging.next() => match next {
                    Some(Ok(len)) => {
                        staged += len;
                        request.report(staged);
                    }
                    Some(Err(e)) => return Err(map_azure_error(key, e)),
                    None => break,
                },
            }
        }

        let mut builder = blob.put_block_list(block_list);
        apply_commit_options!(builder, request);

        let response = tokio::select! {
            biased;
            _ = request.signal.cancelled() => return Err(UploadError::cancelled(key)),
            response = builder.into_future() => response.map_err(|e| map_azure_error(key, e))?,
        };

        Ok((response.etag, response.request_id.to_string()))
    }

    /// Set `Cache-Control` on a committed blob and return the new etag.
    ///
    /// Set Blob Properties replaces every standard header, so the content
    /// headers written at commit are sent again.
    async fn set_cache_control(
        &self,
        blob: &BlobClient,
        key: &str,
        cache_control: &str,
        request: &UploadRequest<'_>,
    ) -> Result<String> {
        let mut builder = blob.set_properties().cache_control(cache_control.to_string());

        if let Some(content_type) = request.effective_content_type() {
            builder = builder.content_type(content_type.to_string());
        }
        if let Some(headers) = &request.options.headers {
            if let Some(value) = &headers.content_encoding {
                builder = builder.content_encoding(value.clone());
            }
            if let Some(value) = &headers.content_language {
                builder = builder.content_language(value.clone());
            }
            if let Some(value) = &headers.content_disposition {
                builder = builder.content_disposition(value.clone());
            }
        }
        if let Some(lease) = lease_id(&request.options)? {
            builder = builder.lease_id(lease);
        }

        builder
            .into_future()
            .await
            .map(|response| response.etag)
            .map_err(|e| map_azure_error(key, e))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        request: UploadRequest<'_>,
    ) -> Result<UploadResult> {
        validate_object_name(key)?;
        request.ensure_active(key)?;

        let size = data.len() as u64;
        let checksum = calculate_checksum(&data);
        let blob = self.container_client.blob_client(key);

        let (mut etag, request_id) = if size <= request.max_single_shot_size() {
            let committed = self.put_single_shot(&blob, key, data, &request).await?;
            request.report(size);
            committed
        } else {
            self.put_blocks(&blob, key, data, &request).await?
        };

        if let Some(cache_control) = cache_control(&request.options) {
            etag = self.set_cache_control(&blob, key, cache_control, &request).await?;
        }

        info!(
            key = %key,
            container = %self.container,
            size,
            "Uploaded to Azure Blob"
        );

        Ok(UploadResult::new(key, size)
            .with_etag(etag)
            .with_request_id(request_id)
            .with_checksum(checksum)
            .with_url(self.public_url(key)))
    }
}

fn account_from_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint)
        .map_err(|e| UploadError::Config(format!("invalid endpoint {}: {}", endpoint, e)))?;

    let host = url
        .host_str()
        .ok_or_else(|| UploadError::Config(format!("endpoint has no host: {}", endpoint)))?;

    let emulator = host == "localhost" || host.parse::<std::net::IpAddr>().is_ok();
    let account = if emulator {
        url.path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty())
    } else {
        host.split('.').next().filter(|label| !label.is_empty())
    };

    account
        .map(String::from)
        .ok_or_else(|| UploadError::Config(format!("cannot derive account from {}", endpoint)))
}

/// Fixed-width block name; every id within one blob must have the same length.
fn block_name(index: usize) -> String {
    format!("block-{:08}", index)
}

fn block_id(index: usize) -> BlockId {
    BlockId::new(Bytes::from(block_name(index)))
}

fn cache_control(options: &UploadOptions) -> Option<&str> {
    options
        .headers
        .as_ref()
        .and_then(|headers| headers.cache_control.as_deref())
}

fn lease_id(options: &UploadOptions) -> Result<Option<LeaseId>> {
    let Some(lease) = options
        .conditions
        .as_ref()
        .and_then(|conditions| conditions.lease_id.as_deref())
    else {
        return Ok(None);
    };

    lease
        .parse()
        .map(Some)
        .map_err(|_| UploadError::Config(format!("invalid lease id: {}", lease)))
}

/// `put_block` cannot carry an encryption scope, so staged uploads reject one.
fn check_block_options(key: &str, options: &UploadOptions) -> Result<()> {
    match &options.encryption_scope {
        Some(scope) => Err(UploadError::Config(format!(
            "{}: encryption scope {} requires a single-shot upload; raise max_single_shot_size",
            key, scope
        ))),
        None => Ok(()),
    }
}

fn access_tier(tier: AccessTier) -> azure_storage_blobs::prelude::AccessTier {
    use azure_storage_blobs::prelude::AccessTier as Tier;
    match tier {
        AccessTier::Hot => Tier::Hot,
        AccessTier::Cool => Tier::Cool,
        AccessTier::Cold => Tier::Cold,
        AccessTier::Archive => Tier::Archive,
    }
}

fn map_azure_error(key: &str, err: azure_core::Error) -> UploadError {
    match err.kind() {
        ErrorKind::HttpResponse { status, error_code } => match *status {
            StatusCode::PreconditionFailed | StatusCode::Conflict => UploadError::ConditionNotMet(
                format!("{}: {}", key, error_code.as_deref().unwrap_or("condition not met")),
            ),
            StatusCode::Forbidden | StatusCode::Unauthorized => {
                UploadError::PermissionDenied(format!("{}: {}", key, err))
            }
            StatusCode::PayloadTooLarge => UploadError::Storage(format!("{}: {}", key, err)),
            StatusCode::RequestTimeout | StatusCode::GatewayTimeout => UploadError::Timeout,
            _ => UploadError::Storage(err.to_string()),
        },
        ErrorKind::Io if is_interrupted(&err) => UploadError::cancelled(key),
        ErrorKind::Io => UploadError::Network(err.to_string()),
        _ => UploadError::Storage(err.to_string()),
    }
}

/// An aborted in-flight request surfaces as an interrupted I/O error.
fn is_interrupted(err: &azure_core::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::Interrupted)
}
