//! Upload option sets and their layering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{Result, UploadError};

/// Storage tier for an uploaded blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessTier {
    #[serde(alias = "hot")]
    Hot,
    #[serde(alias = "cool")]
    Cool,
    #[serde(alias = "cold")]
    Cold,
    #[serde(alias = "archive")]
    Archive,
}

impl AccessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Cool => "Cool",
            Self::Cold => "Cold",
            Self::Archive => "Archive",
        }
    }
}

impl FromStr for AccessTier {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "cool" => Ok(Self::Cool),
            "cold" => Ok(Self::Cold),
            "archive" => Ok(Self::Archive),
            other => Err(UploadError::Config(format!("unknown access tier: {}", other))),
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP headers stored with the blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHttpHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
}

impl BlobHttpHeaders {
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }
}

/// Predicates the destination must satisfy for the write to happen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConditions {
    /// Only overwrite when the current ETag matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_match: Option<String>,
    /// Only write when the current ETag differs; `"*"` means "must not exist".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_none_match: Option<String>,
    /// SQL-like predicate over the existing blob's tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_tags: Option<String>,
    /// Active lease on the destination blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
}

impl WriteConditions {
    /// Fail the write when the object already exists.
    pub fn create_only() -> Self {
        Self {
            if_none_match: Some("*".to_string()),
            ..Default::default()
        }
    }
}

/// Upload tuning parameters for a single transfer.
///
/// Every field is optional; `None` means "inherit from the layer below".
/// An explicitly empty value such as `Some(BTreeMap::new())` is a real
/// value and overrides the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BlobHttpHeaders>,
    /// Size of each staged block for chunked uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<WriteConditions>,
    /// Maximum blocks in flight at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_scope: Option<String>,
    /// Payloads up to this size go up in a single request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_single_shot_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<AccessTier>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer a per-file override on top of batch defaults.
    ///
    /// Precedence is decided per field: a field set in `file_override` wins,
    /// otherwise the default's value (or nothing) is used. Maps are taken
    /// whole, never merged key by key.
    pub fn resolve(defaults: &UploadOptions, file_override: Option<&UploadOptions>) -> UploadOptions {
        let Some(over) = file_override else {
            return defaults.clone();
        };

        fn pick<T: Clone>(over: &Option<T>, default: &Option<T>) -> Option<T> {
            over.as_ref().or(default.as_ref()).cloned()
        }

        UploadOptions {
            headers: pick(&over.headers, &defaults.headers),
            block_size: pick(&over.block_size, &defaults.block_size),
            conditions: pick(&over.conditions, &defaults.conditions),
            concurrency: pick(&over.concurrency, &defaults.concurrency),
            encryption_scope: pick(&over.encryption_scope, &defaults.encryption_scope),
            max_single_shot_size: pick(&over.max_single_shot_size, &defaults.max_single_shot_size),
            metadata: pick(&over.metadata, &defaults.metadata),
            tags: pick(&over.tags, &defaults.tags),
            tier: pick(&over.tier, &defaults.tier),
        }
    }

    /// Reject values no backend can honor.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == Some(0) {
            return Err(UploadError::Config("block_size must be greater than 0".into()));
        }
        if self.concurrency == Some(0) {
            return Err(UploadError::Config("concurrency must be greater than 0".into()));
        }
        if self.max_single_shot_size == Some(0) {
            return Err(UploadError::Config(
                "max_single_shot_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn headers(mut self, headers: BlobHttpHeaders) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn block_size(mut self, size: u64) -> Self {
        self.block_size = Some(size);
        self
    }

    pub fn conditions(mut self, conditions: WriteConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn encryption_scope(mut self, scope: impl Into<String>) -> Self {
        self.encryption_scope = Some(scope.into());
        self
    }

    pub fn max_single_shot_size(mut self, size: u64) -> Self {
        self.max_single_shot_size = Some(size);
        self
    }

    /// Add one metadata entry, creating the map if needed.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add one tag, creating the map if needed.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn tier(mut self, tier: AccessTier) -> Self {
        self.tier = Some(tier);
        self
    }
}
