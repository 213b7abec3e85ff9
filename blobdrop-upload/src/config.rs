//! Uploader configuration.

use blobdrop_config::{ConfigError, ConfigManager, ConfigValidator, EnvLoader, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{AccessTier, UploadOptions};

/// Prefix of the environment variables read by [`UploaderConfig::from_env`].
pub const ENV_PREFIX: &str = "BLOBDROP";

fn default_id() -> String {
    "AzureBlob".to_string()
}

/// Construction-time settings for an uploader.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Name the uploader registers under.
    #[serde(default = "default_id")]
    pub id: String,
    /// Blob service endpoint, e.g. `https://account.blob.core.windows.net`.
    pub endpoint: String,
    pub container: String,
    /// Shared access signature query string.
    pub sas: String,
    /// Batch-wide option defaults.
    #[serde(default)]
    pub default_options: UploadOptions,
}

impl UploaderConfig {
    pub fn new(
        endpoint: impl Into<String>,
        container: impl Into<String>,
        sas: impl Into<String>,
    ) -> Self {
        Self {
            id: default_id(),
            endpoint: endpoint.into(),
            container: container.into(),
            sas: sas.into(),
            default_options: UploadOptions::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_default_options(mut self, options: UploadOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Load from `BLOBDROP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load from environment variables under a custom prefix.
    ///
    /// `ENDPOINT`, `CONTAINER` and `SAS` are required. `ID`, `TIER`,
    /// `BLOCK_SIZE`, `CONCURRENCY`, `MAX_SINGLE_SHOT_SIZE` and
    /// `ENCRYPTION_SCOPE` are optional.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let env = EnvLoader::with_prefix(prefix);

        let default_options = UploadOptions {
            tier: env.load_parsed::<AccessTier>("tier")?,
            block_size: env.load_parsed("block_size")?,
            concurrency: env.load_parsed("concurrency")?,
            max_single_shot_size: env.load_parsed("max_single_shot_size")?,
            encryption_scope: env.load_parsed("encryption_scope")?,
            ..Default::default()
        };

        let config = Self {
            id: env.load_var_or("id", "AzureBlob"),
            endpoint: env.load_var("endpoint")?,
            container: env.load_var("container")?,
            sas: env.load_var("sas")?,
            default_options,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON or TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let manager = ConfigManager::new();
        manager.load_file(path)?;
        manager.load_validated()
    }
}

impl Validate for UploaderConfig {
    fn validate(&self) -> blobdrop_config::Result<()> {
        ConfigValidator::not_empty(&self.id, "id")?;
        ConfigValidator::is_url(&self.endpoint, "endpoint")?;
        ConfigValidator::not_empty(&self.container, "container")?;
        ConfigValidator::not_empty(&self.sas, "sas")?;
        ConfigValidator::positive_if_set(self.default_options.block_size, "block_size")?;
        ConfigValidator::positive_if_set(self.default_options.concurrency, "concurrency")?;
        ConfigValidator::positive_if_set(
            self.default_options.max_single_shot_size,
            "max_single_shot_size",
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for UploaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploaderConfig")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("container", &self.container)
            .field("sas", &"<redacted>")
            .field("default_options", &self.default_options)
            .finish()
    }
}
