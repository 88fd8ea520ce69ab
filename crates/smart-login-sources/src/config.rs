//! Tunables for the five signal sources.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for all signal sources.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub bluetooth: BluetoothConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub rotation: RotationConfig,

    #[serde(default)]
    pub light: LightConfig,
}

/// Proximity scan configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// Case-sensitive substring a peer name must contain
    #[serde(default = "default_target_name")]
    pub target_name: String,

    /// Discovery is cancelled if it has not finished by then
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Cancel discovery as soon as the target is seen
    #[serde(default)]
    pub stop_on_first_match: bool,
}

impl BluetoothConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            target_name: default_target_name(),
            scan_timeout_secs: default_scan_timeout_secs(),
            stop_on_first_match: false,
        }
    }
}

/// Spoken password configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Literal the transcript must contain (case-insensitive)
    #[serde(default = "default_password")]
    pub password: String,

    /// Recogniser locale tag
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            password: default_password(),
            locale: default_locale(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Full turns around the z axis needed to pass
    #[serde(default = "default_required_turns")]
    pub required_turns: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            required_turns: default_required_turns(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightConfig {
    /// Readings strictly above this pass
    #[serde(default = "default_bright_threshold_lux")]
    pub bright_threshold_lux: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            bright_threshold_lux: default_bright_threshold_lux(),
        }
    }
}

fn default_target_name() -> String {
    "AirPods".to_string()
}

fn default_scan_timeout_secs() -> u64 {
    10
}

fn default_password() -> String {
    "Password".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_required_turns() -> f64 {
    2.0
}

fn default_bright_threshold_lux() -> f32 {
    10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_application_constants() {
        let config = SourcesConfig::default();
        assert_eq!(config.bluetooth.target_name, "AirPods");
        assert_eq!(config.bluetooth.scan_timeout(), Duration::from_secs(10));
        assert!(!config.bluetooth.stop_on_first_match);
        assert_eq!(config.voice.password, "Password");
        assert_eq!(config.voice.locale, "en-US");
        assert_eq!(config.rotation.required_turns, 2.0);
        assert_eq!(config.light.bright_threshold_lux, 10.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SourcesConfig =
            serde_json::from_str(r#"{ "bluetooth": { "target_name": "Buds" } }"#).unwrap();
        assert_eq!(config.bluetooth.target_name, "Buds");
        assert_eq!(config.bluetooth.scan_timeout_secs, 10);
        assert_eq!(config.voice.password, "Password");
    }
}
