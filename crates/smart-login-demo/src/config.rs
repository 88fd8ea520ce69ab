//! Configuration for the demo binary

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smart_login_gate::GateConfig;
use smart_login_sources::SourcesConfig;

/// Demo configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Controller channel sizes
    #[serde(default)]
    pub gate: GateConfig,

    /// Per-source tunables
    #[serde(default)]
    pub sources: SourcesConfig,

    /// JSON file for recorded callers; in-memory when unset
    #[serde(default)]
    pub fact_store_path: Option<PathBuf>,

    /// Simulated environment
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// What the simulated device reports during the demo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Name of the peer the simulated radio has connected
    #[serde(default = "default_peer_name")]
    pub peer_name: String,

    /// Recorded caller and the number they called from
    #[serde(default = "default_caller_name")]
    pub caller_name: String,

    #[serde(default = "default_caller_number")]
    pub caller_number: String,

    /// What the simulated recogniser hears
    #[serde(default = "default_transcript")]
    pub transcript: String,

    /// Ambient light reported by the simulated sensor
    #[serde(default = "default_lux")]
    pub lux: f32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            peer_name: default_peer_name(),
            caller_name: default_caller_name(),
            caller_number: default_caller_number(),
            transcript: default_transcript(),
            lux: default_lux(),
        }
    }
}

fn default_peer_name() -> String {
    "AirPods Pro".to_string()
}

fn default_caller_name() -> String {
    "Alex".to_string()
}

fn default_caller_number() -> String {
    "+15550100".to_string()
}

fn default_transcript() -> String {
    "my password is password".to_string()
}

fn default_lux() -> f32 {
    180.0
}

impl DemoConfig {
    /// Load configuration from file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: DemoConfig = toml::from_str(&contents)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(DemoConfig::default())
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Cannot find config directory")?;
        Ok(config_dir.join("smart-login").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DemoConfig::default();
        assert!(config.fact_store_path.is_none());
        assert_eq!(config.sources.bluetooth.target_name, "AirPods");
        assert_eq!(config.gate.signal_buffer, 256);
        assert_eq!(config.scenario.caller_name, "Alex");
    }

    #[test]
    fn test_load_missing_config() {
        let config = DemoConfig::load(Some("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.sources.voice.password, "Password");
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
fact_store_path = "/tmp/smart-login/facts.json"

[sources.bluetooth]
target_name = "Buds"
scan_timeout_secs = 4

[sources.light]
bright_threshold_lux = 25.0

[scenario]
lux = 3.5
"#,
        )
        .unwrap();

        let config = DemoConfig::load(path.to_str()).unwrap();
        assert_eq!(config.sources.bluetooth.target_name, "Buds");
        assert_eq!(config.sources.bluetooth.scan_timeout_secs, 4);
        assert_eq!(config.sources.light.bright_threshold_lux, 25.0);
        assert_eq!(config.sources.rotation.required_turns, 2.0);
        assert_eq!(config.scenario.lux, 3.5);
        assert_eq!(config.scenario.caller_name, "Alex");
        assert_eq!(
            config.fact_store_path,
            Some(PathBuf::from("/tmp/smart-login/facts.json"))
        );
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sources.bluetooth\n").unwrap();

        assert!(DemoConfig::load(path.to_str()).is_err());
    }
}
