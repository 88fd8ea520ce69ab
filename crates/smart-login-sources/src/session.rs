use std::sync::Arc;

use smart_login_gate::SignalSource;
use tracing::debug;

use crate::bluetooth::BluetoothProximitySource;
use crate::call_match::CallMatchSource;
use crate::config::SourcesConfig;
use crate::light::LightSource;
use crate::platform::{
    FactStore, LocationService, MotionSensors, PermissionAuthority, ProximityRadio,
    SpeechRecognizer,
};
use crate::rotation::RotationSource;
use crate::simulated::{
    SimulatedLocation, SimulatedPermissions, SimulatedRadio, SimulatedRecognizer,
    SimulatedSensors,
};
use crate::voice::VoiceSource;

/// Shared platform handles for one login session.
#[derive(Clone)]
pub struct Platform {
    pub permissions: Arc<dyn PermissionAuthority>,
    pub radio: Arc<dyn ProximityRadio>,
    pub location: Arc<dyn LocationService>,
    pub sensors: Arc<dyn MotionSensors>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub facts: Arc<dyn FactStore>,
}

impl Platform {
    /// A platform with every service present, enabled and granted, and
    /// nothing happening. Facts come from the given store.
    pub fn simulated(facts: Arc<dyn FactStore>) -> Self {
        Self {
            permissions: Arc::new(SimulatedPermissions::granting_all()),
            radio: Arc::new(SimulatedRadio::new()),
            location: Arc::new(SimulatedLocation::new(true)),
            sensors: Arc::new(SimulatedSensors::new()),
            recognizer: Arc::new(SimulatedRecognizer::new(Vec::new())),
            facts,
        }
    }
}

/// Build the five sources in presentation order.
pub fn build_sources(config: &SourcesConfig, platform: &Platform) -> Vec<Arc<dyn SignalSource>> {
    let sources: Vec<Arc<dyn SignalSource>> = vec![
        Arc::new(BluetoothProximitySource::new(
            platform.permissions.clone(),
            platform.radio.clone(),
            platform.location.clone(),
            config.bluetooth.clone(),
        )),
        Arc::new(VoiceSource::new(
            platform.permissions.clone(),
            platform.recognizer.clone(),
            config.voice.clone(),
        )),
        Arc::new(CallMatchSource::new(
            platform.permissions.clone(),
            platform.facts.clone(),
        )),
        Arc::new(RotationSource::new(
            platform.sensors.clone(),
            config.rotation.clone(),
        )),
        Arc::new(LightSource::new(
            platform.sensors.clone(),
            config.light.clone(),
        )),
    ];
    debug!(count = sources.len(), "Built signal sources");
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::InMemoryFactStore;
    use smart_login_types::ConditionId;

    #[test]
    fn sources_follow_presentation_order() {
        let platform = Platform::simulated(Arc::new(InMemoryFactStore::new()));
        let ids: Vec<_> = build_sources(&SourcesConfig::default(), &platform)
            .iter()
            .map(|s| s.condition())
            .collect();
        assert_eq!(ids, ConditionId::ALL.to_vec());
    }
}
