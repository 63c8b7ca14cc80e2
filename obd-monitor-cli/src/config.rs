//! Configuration loading and parsing

use anyhow::{Context, Result};
use obd_monitor::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// candump log to feed through the engine
    pub file: Option<PathBuf>,
    /// Additional passes over the log after the first
    #[serde(default)]
    pub loops: usize,
    /// Stamp replayed frames with the current time
    #[serde(default)]
    pub restamp: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Pretty-print JSON snapshots
    #[serde(default)]
    pub pretty: bool,
    /// Print every observed frame in candump format
    #[serde(default)]
    pub raw: bool,
    /// Interface name written in raw candump lines
    #[serde(default = "default_interface")]
    pub interface: String,
}

fn default_interface() -> String {
    "can0".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            raw: false,
            interface: default_interface(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.monitor.frames_per_cycle == 0 {
        anyhow::bail!("monitor.frames_per_cycle must be at least 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [monitor]
            poll_interval_ms = 500
            extended_addressing = false

            [monitor.publish]
            enabled = true
            topic_prefix = "car"

            [replay]
            file = "drive.log"
            loops = 2

            [output]
            raw = true
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.monitor.poll_interval_ms, 500);
        assert!(!config.monitor.extended_addressing);
        assert_eq!(config.monitor.soh_timeout_ms, 2000);
        assert!(config.monitor.publish.enabled);
        assert_eq!(config.monitor.publish.topic_prefix, "car");
        assert_eq!(config.replay.file, Some(PathBuf::from("drive.log")));
        assert_eq!(config.replay.loops, 2);
        assert!(config.output.raw);
        assert!(!config.output.pretty);
        assert_eq!(config.output.interface, "can0");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.monitor, MonitorConfig::default());
        assert!(config.replay.file.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]\nconnect_attempts = 2").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.monitor.connect_attempts, 2);
    }

    #[test]
    fn test_load_config_rejects_zero_frames_per_cycle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]\nframes_per_cycle = 0").unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
