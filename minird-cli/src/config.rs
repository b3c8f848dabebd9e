//! Configuration loading and parsing

use anyhow::{Context, Result};
use minird_bridge::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration (loaded from an optional TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Port the controller is attached to; probed when absent
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Read timeout while probing candidate ports
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout() -> u64 {
    5000
}

fn default_probe_timeout() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7766
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

impl SimulatorConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .with_context(|| format!("Invalid simulator address: {}:{}", self.address, self.port))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_calibration_path")]
    pub path: PathBuf,
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from("miniRD.cal")
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: default_calibration_path(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config.simulator.socket_addr()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [serial]
            port = "COM4"

            [simulator]
            port = 7000

            [engine]
            notch_margin = 6

            [engine.dyn_brake]
            deadband = 2
            snap_to_zero_at = 5
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("COM4"));
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout(), Duration::from_secs(5));
        assert_eq!(config.simulator.address, "127.0.0.1");
        assert_eq!(config.simulator.port, 7000);
        assert_eq!(config.calibration.path, PathBuf::from("miniRD.cal"));
        assert_eq!(config.engine.notch_margin, 6);
        assert_eq!(config.engine.dyn_brake.snap_to_zero_at, Some(5));
        assert_eq!(config.engine.alerter_interval_ms, 30_000);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.serial.port.is_none());
        assert_eq!(
            config.simulator.socket_addr().unwrap(),
            "127.0.0.1:7766".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_load_config_rejects_bad_address() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("minird.toml");
        fs::write(&path, "[simulator]\naddress = \"not an ip\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
