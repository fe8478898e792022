use anyhow::{Context, Result};
use recallkit_core::{FsrsParams, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the optional `--config` file. Every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    /// Caps scheduled intervals, in days.
    pub maximum_interval: Option<f64>,
}

impl AppConfig {
    /// Reads `path` when given; a missing `--config` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn fsrs_params(&self) -> FsrsParams {
        let mut params = FsrsParams::default();
        if let Some(max) = self.maximum_interval {
            params.maximum_interval = max;
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"store":{"write_through":false},"maximum_interval":365}"#)
                .unwrap();
        assert!(!cfg.store.write_through);
        assert_eq!(cfg.store.snapshot_name, "recallkit");
        assert_eq!(cfg.store.retention.default, 0.9);
        assert_eq!(cfg.fsrs_params().maximum_interval, 365.0);
    }

    #[test]
    fn missing_path_is_default() {
        let cfg = AppConfig::load(None).unwrap();
        assert!(cfg.store.write_through);
        assert!(cfg.maximum_interval.is_none());
    }

    #[test]
    fn reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"store":{"snapshot_name":"notes"}}"#).unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.store.snapshot_name, "notes");
    }
}
