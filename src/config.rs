//! Configuration loader and validator for the donation sync agent.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

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
    pub remote: Remote,
}

/// App-level settings. The millisecond delays tune the queue's flush
/// scheduling; the second intervals drive the agent's background loops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub flush_interval_secs: u64,
    pub probe_interval_secs: u64,
    pub reconnect_delay_ms: u64,
    pub enqueue_delay_ms: u64,
    pub inter_item_delay_ms: u64,
}

/// Remote store settings (hosted-Postgres REST insert API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Remote {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
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
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.flush_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.flush_interval_secs must be > 0"));
    }
    if cfg.app.probe_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.probe_interval_secs must be > 0"));
    }
    // The delay knobs may legitimately be zero (tests, aggressive setups).

    if cfg.remote.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.base_url must be non-empty"));
    }
    if cfg.remote.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.api_key must be non-empty"));
    }
    if cfg.remote.table.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.table must be non-empty"));
    }

    Ok(())
}

/// Example YAML configuration, kept in sync with the `Config` schema.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  flush_interval_secs: 60
  probe_interval_secs: 15
  reconnect_delay_ms: 2000
  enqueue_delay_ms: 500
  inter_item_delay_ms: 300

remote:
  base_url: "https://YOUR-PROJECT.example.co/"
  api_key: "YOUR_SERVICE_API_KEY"
  table: "transactions"
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
    }

    #[test]
    fn invalid_intervals() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.flush_interval_secs = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("flush_interval_secs")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.probe_interval_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_delays_are_allowed() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.reconnect_delay_ms = 0;
        cfg.app.enqueue_delay_ms = 0;
        cfg.app.inter_item_delay_ms = 0;
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_remote_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.base_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.api_key = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.table = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
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
        assert_eq!(cfg.remote.table, "transactions");
    }
}
