//! Integration tests for blobdrop-config

use blobdrop_config::*;
use serde::Deserialize;
use std::env;
use std::io::Write;

#[derive(Debug, Deserialize)]
struct Target {
    endpoint: String,
    container: String,
    #[serde(default)]
    concurrency: Option<usize>,
}

impl Validate for Target {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.endpoint, "endpoint")?;
        ConfigValidator::not_empty(&self.container, "container")?;
        ConfigValidator::positive_if_set(self.concurrency, "concurrency")
    }
}

fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_toml_file_validated() {
    let file = write_file(
        ".toml",
        r#"
        endpoint = "https://acct.blob.core.windows.net"
        container = "photos"
        concurrency = 4
        "#,
    );

    let manager = ConfigManager::new();
    manager.load_file(file.path()).unwrap();

    let target: Target = manager.load_validated().unwrap();
    assert_eq!(target.container, "photos");
    assert_eq!(target.concurrency, Some(4));
}

#[test]
fn test_load_json_file_fails_validation() {
    let file = write_file(
        ".json",
        r#"{"endpoint": "acct.blob.core.windows.net", "container": "photos"}"#,
    );

    let manager = ConfigManager::new();
    manager.load_file(file.path()).unwrap();

    let result = manager.load_validated::<Target>();
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_load_unknown_extension() {
    let file = write_file(".yaml", "container: photos");
    let manager = ConfigManager::new();
    assert!(matches!(
        manager.load_file(file.path()),
        Err(ConfigError::LoadError(_))
    ));
}

#[test]
fn test_env_prefix_loading() {
    unsafe {
        env::set_var("BLOBDROP_IT_ENDPOINT", "https://acct.blob.core.windows.net");
        env::set_var("BLOBDROP_IT_CONTAINER", "videos");
    }

    let manager = ConfigManager::with_prefix("BLOBDROP_IT");
    manager.load_env().unwrap();

    let target: Target = manager.load_validated().unwrap();
    assert_eq!(target.container, "videos");
    assert_eq!(target.concurrency, None);

    unsafe {
        env::remove_var("BLOBDROP_IT_ENDPOINT");
        env::remove_var("BLOBDROP_IT_CONTAINER");
    }
}

#[test]
fn test_env_loader_missing_var() {
    let loader = EnvLoader::new(None);

    let result = loader.load_var("NONEXISTENT_VAR_123456");
    assert!(result.is_err());
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::invalid_value("BLOBDROP_TIER", "unknown access tier");
    assert_eq!(
        err.to_string(),
        "Invalid value for BLOBDROP_TIER: unknown access tier"
    );
}
