use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use smart_login_gate::{SignalSink, SignalSource};
use smart_login_types::{ConditionId, FailureKind};
use tracing::{debug, warn};

use crate::config::LightConfig;
use crate::platform::{MotionSensors, SensorKind, SubscriptionId};

/// Strict threshold: a reading equal to the threshold is dark.
pub fn is_bright(lux: f32, threshold_lux: f32) -> bool {
    lux > threshold_lux
}

/// Ambient light classifier.
///
/// Re-evaluates on every reading for as long as the listener is
/// registered, so the condition may flip between passed and failed.
pub struct LightSource {
    sensors: Arc<dyn MotionSensors>,
    config: LightConfig,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl LightSource {
    pub fn new(sensors: Arc<dyn MotionSensors>, config: LightConfig) -> Self {
        Self {
            sensors,
            config,
            subscription: Mutex::new(None),
        }
    }

    fn release(&self) {
        if let Some(id) = self.subscription.lock().take() {
            debug!(subscription = %id, "Unregistering light listener");
            self.sensors.unregister(id);
        }
    }
}

#[async_trait]
impl SignalSource for LightSource {
    fn condition(&self) -> ConditionId {
        ConditionId::RoomBright
    }

    async fn start(&self, sink: SignalSink) {
        if !self.sensors.has_sensor(SensorKind::Light) {
            sink.fail("❌ No Light Sensor", FailureKind::ServiceUnavailable)
                .await;
            return;
        }

        let subscription = match self.sensors.register(SensorKind::Light) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "Light sensor registration failed");
                sink.fail("❌ Light Sensor Unavailable", FailureKind::ServiceUnavailable)
                    .await;
                return;
            }
        };

        // A restart after pause replaces any stale registration.
        self.release();
        *self.subscription.lock() = Some(subscription.id);

        let mut readings = subscription.readings;
        while let Some(reading) = readings.recv().await {
            let lux = reading.values[0];
            debug!(lux, "Light level");

            if is_bright(lux, self.config.bright_threshold_lux) {
                sink.pass("✔ Room is Bright").await;
            } else {
                sink.fail("❌ Room is Dark", FailureKind::NotFound).await;
            }
        }

        self.release();
    }

    fn stop(&self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SensorReading;
    use crate::simulated::SimulatedSensors;
    use smart_login_gate::SourceOutput;
    use tokio::sync::mpsc;

    #[test]
    fn threshold_is_strict() {
        assert!(!is_bright(10.0, 10.0));
        assert!(is_bright(10.01, 10.0));
        assert!(!is_bright(0.0, 10.0));
    }

    async fn next_passed(rx: &mut mpsc::Receiver<SourceOutput>) -> bool {
        match rx.recv().await {
            Some(SourceOutput::Signal(event)) => event.passed,
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn readings_flap_both_directions() {
        let sensors = Arc::new(SimulatedSensors::new().with_script(
            SensorKind::Light,
            vec![
                SensorReading::light(1, 10.0),
                SensorReading::light(2, 10.01),
                SensorReading::light(3, 3.0),
                SensorReading::light(4, 250.0),
            ],
        ));
        let source = Arc::new(LightSource::new(sensors.clone(), LightConfig::default()));
        let (tx, mut rx) = mpsc::channel(16);

        let task = {
            let source = source.clone();
            tokio::spawn(async move {
                source
                    .start(SignalSink::new(ConditionId::RoomBright, tx))
                    .await
            })
        };

        assert!(!next_passed(&mut rx).await);
        assert!(next_passed(&mut rx).await);
        assert!(!next_passed(&mut rx).await);
        assert!(next_passed(&mut rx).await);

        source.stop();
        task.await.unwrap();
        assert_eq!(sensors.active_count(SensorKind::Light), 0);

        // Releasing twice is harmless.
        source.stop();
    }

    #[tokio::test]
    async fn missing_sensor_reports_unsupported_and_never_registers() {
        let sensors = Arc::new(SimulatedSensors::new().without(SensorKind::Light));
        let source = LightSource::new(sensors.clone(), LightConfig::default());
        let (tx, mut rx) = mpsc::channel(4);

        source.start(SignalSink::new(ConditionId::RoomBright, tx)).await;

        match rx.recv().await {
            Some(SourceOutput::Signal(event)) => {
                assert_eq!(event.failure, Some(FailureKind::ServiceUnavailable));
                assert_eq!(event.status, "❌ No Light Sensor");
            }
            other => panic!("unexpected output: {:?}", other),
        }
        assert_eq!(sensors.registrations(SensorKind::Light), 0);
    }
}
