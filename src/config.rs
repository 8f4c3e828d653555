//! Configuration loader and validator for the activity sync service.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::engine::SyncOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub snapshot: SnapshotApi,
    pub sync: SyncSettings,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Provider snapshot API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotApi {
    pub base_url: String,
    pub version: String,
    pub domain: String,
}

/// Batching and scheduling knobs for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_post_limit")]
    pub post_limit: usize,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay_ms() -> u64 {
    10_000
}

fn default_post_limit() -> usize {
    20
}

fn default_interval_seconds() -> u64 {
    3600
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/activity_sync.db", self.app.data_dir))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.sync.batch_size,
            batch_delay: Duration::from_millis(self.sync.batch_delay_ms),
            post_limit: self.sync.post_limit,
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.snapshot.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("snapshot.base_url must be non-empty"));
    }
    match reqwest::Url::parse(&cfg.snapshot.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(ConfigError::Invalid(
                "snapshot.base_url must be a valid http(s) URL",
            ))
        }
    }
    if cfg.snapshot.version.trim().is_empty() {
        return Err(ConfigError::Invalid("snapshot.version must be non-empty"));
    }
    if cfg.snapshot.domain.trim().is_empty() {
        return Err(ConfigError::Invalid("snapshot.domain must be non-empty"));
    }

    if cfg.sync.batch_size == 0 {
        return Err(ConfigError::Invalid("sync.batch_size must be > 0"));
    }
    if cfg.sync.post_limit == 0 {
        return Err(ConfigError::Invalid("sync.post_limit must be > 0"));
    }
    if cfg.sync.interval_seconds == 0 {
        return Err(ConfigError::Invalid("sync.interval_seconds must be > 0"));
    }
    // batch_delay_ms of 0 disables the courtesy pause

    Ok(())
}

/// Returns the example YAML content shipped with the service.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

snapshot:
  base_url: "https://api.linkedin.com/"
  version: "202312"
  domain: "MEMBER_SHARE_INFO"

sync:
  batch_size: 5
  batch_delay_ms: 10000
  post_limit: 20
  interval_seconds: 3600
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.sync.batch_size, 5);
        assert_eq!(cfg.sync_options().batch_delay, Duration::from_secs(10));
    }

    #[test]
    fn sync_section_defaults() {
        let yaml = r#"app:
  data_dir: "./data"
snapshot:
  base_url: "https://api.linkedin.com/"
  version: "202312"
  domain: "MEMBER_SHARE_INFO"
sync: {}
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        let opts = cfg.sync_options();
        assert_eq!(opts.batch_size, 5);
        assert_eq!(opts.batch_delay, Duration::from_secs(10));
        assert_eq!(opts.post_limit, 20);
        assert_eq!(cfg.sync.interval_seconds, 3600);
    }

    #[test]
    fn invalid_snapshot_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.snapshot.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.snapshot.base_url = "mailto:ops@example.com".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.snapshot.version = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.snapshot.domain = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_sync_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sync.batch_size = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("batch_size")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sync.post_limit = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sync.batch_delay_ms = 0;
        validate(&cfg).unwrap();
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.snapshot.domain, "MEMBER_SHARE_INFO");
    }
}
