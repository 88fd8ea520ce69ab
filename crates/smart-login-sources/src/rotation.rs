use std::f64::consts::TAU;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use smart_login_gate::{SignalSink, SignalSource};
use smart_login_types::{ConditionId, FailureKind};
use tracing::{debug, info, warn};

use crate::config::RotationConfig;
use crate::platform::{MotionSensors, SensorKind, SubscriptionId};

/// Result of feeding one gyroscope sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RotationProgress {
    /// First sample since (re)registration; only sets the baseline
    Baseline,
    /// Accumulated turns so far
    Turning(f64),
    /// Threshold crossed on this sample
    Complete(f64),
    /// Threshold was crossed earlier; sample ignored
    AlreadyComplete,
}

/// Integrates z-axis angular velocity into accumulated rotation.
///
/// Direction is not tracked: turns are the absolute accumulated angle
/// divided by a full circle, so back-and-forth motion cancels out.
#[derive(Clone, Debug)]
pub struct RotationIntegrator {
    required_turns: f64,
    last_timestamp_ns: Option<i64>,
    rotation_rad: f64,
    complete: bool,
}

impl RotationIntegrator {
    pub fn new(required_turns: f64) -> Self {
        Self {
            required_turns,
            last_timestamp_ns: None,
            rotation_rad: 0.0,
            complete: false,
        }
    }

    pub fn feed(&mut self, timestamp_ns: i64, z_rate: f32) -> RotationProgress {
        if self.complete {
            return RotationProgress::AlreadyComplete;
        }

        let Some(last) = self.last_timestamp_ns else {
            self.last_timestamp_ns = Some(timestamp_ns);
            return RotationProgress::Baseline;
        };

        let dt = (timestamp_ns - last) as f64 / 1e9;
        // Out-of-order or duplicate samples contribute nothing.
        if dt <= 0.0 {
            return RotationProgress::Turning(self.turns());
        }
        self.last_timestamp_ns = Some(timestamp_ns);
        self.rotation_rad += f64::from(z_rate) * dt;

        let turns = self.turns();
        if turns >= self.required_turns {
            self.complete = true;
            RotationProgress::Complete(turns)
        } else {
            RotationProgress::Turning(turns)
        }
    }

    /// Forget the timestamp baseline but keep the accumulated rotation.
    pub fn rebaseline(&mut self) {
        self.last_timestamp_ns = None;
    }

    pub fn turns(&self) -> f64 {
        self.rotation_rad.abs() / TAU
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Detects the device being spun a number of full turns.
///
/// Once detected the condition stays passed and the gyroscope listener is
/// released; a restart after that reports nothing.
pub struct RotationSource {
    sensors: Arc<dyn MotionSensors>,
    config: RotationConfig,
    integrator: Mutex<RotationIntegrator>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl RotationSource {
    pub fn new(sensors: Arc<dyn MotionSensors>, config: RotationConfig) -> Self {
        let integrator = RotationIntegrator::new(config.required_turns);
        Self {
            sensors,
            config,
            integrator: Mutex::new(integrator),
            subscription: Mutex::new(None),
        }
    }

    pub fn turns(&self) -> f64 {
        self.integrator.lock().turns()
    }

    fn release(&self) {
        if let Some(id) = self.subscription.lock().take() {
            debug!(subscription = %id, "Unregistering gyroscope listener");
            self.sensors.unregister(id);
        }
    }
}

#[async_trait]
impl SignalSource for RotationSource {
    fn condition(&self) -> ConditionId {
        ConditionId::DeviceSpin
    }

    async fn start(&self, sink: SignalSink) {
        if self.integrator.lock().is_complete() {
            debug!("Rotation already detected");
            return;
        }

        if !self.sensors.has_sensor(SensorKind::Gyroscope) {
            sink.fail("❌ No Gyroscope", FailureKind::ServiceUnavailable)
                .await;
            return;
        }

        let subscription = match self.sensors.register(SensorKind::Gyroscope) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "Gyroscope registration failed");
                sink.fail("❌ Gyroscope Unavailable", FailureKind::ServiceUnavailable)
                    .await;
                return;
            }
        };

        self.release();
        *self.subscription.lock() = Some(subscription.id);
        self.integrator.lock().rebaseline();

        let mut readings = subscription.readings;
        while let Some(reading) = readings.recv().await {
            let progress = self
                .integrator
                .lock()
                .feed(reading.timestamp_ns, reading.values[2]);

            match progress {
                RotationProgress::Complete(turns) => {
                    info!(turns, required = self.config.required_turns, "Rotation detected");
                    sink.pass(format!(
                        "✔ {} Spins Detected!",
                        self.config.required_turns
                    ))
                    .await;
                    break;
                }
                RotationProgress::Turning(turns) => {
                    debug!(turns, "Rotation progress");
                }
                RotationProgress::Baseline | RotationProgress::AlreadyComplete => {}
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

    const SECOND: i64 = 1_000_000_000;

    #[test]
    fn crosses_two_turns_on_fifth_interval() {
        let mut integrator = RotationIntegrator::new(2.0);
        assert_eq!(integrator.feed(0, 3.0), RotationProgress::Baseline);

        // 3 rad/s for 1 s per sample: 2 turns need 4π ≈ 12.57 rad.
        for i in 1..=4 {
            assert!(matches!(
                integrator.feed(i * SECOND, 3.0),
                RotationProgress::Turning(_)
            ));
        }
        assert!(matches!(
            integrator.feed(5 * SECOND, 3.0),
            RotationProgress::Complete(t) if t >= 2.0
        ));
        assert_eq!(
            integrator.feed(6 * SECOND, 3.0),
            RotationProgress::AlreadyComplete
        );
    }

    #[test]
    fn opposite_directions_cancel() {
        let mut integrator = RotationIntegrator::new(2.0);
        integrator.feed(0, 0.0);
        integrator.feed(SECOND, 6.0);
        integrator.feed(2 * SECOND, -6.0);
        assert!(integrator.turns() < 1e-9);
    }

    #[test]
    fn non_positive_interval_is_ignored() {
        let mut integrator = RotationIntegrator::new(2.0);
        integrator.feed(5 * SECOND, 3.0);
        integrator.feed(5 * SECOND, 3.0);
        integrator.feed(4 * SECOND, 3.0);
        assert_eq!(integrator.turns(), 0.0);
    }

    #[test]
    fn rebaseline_keeps_accumulated_rotation() {
        let mut integrator = RotationIntegrator::new(2.0);
        integrator.feed(0, 0.0);
        integrator.feed(2 * SECOND, 3.0);
        let before = integrator.turns();

        integrator.rebaseline();
        // A large clock jump across the pause must not count as turning.
        assert_eq!(integrator.feed(100 * SECOND, 3.0), RotationProgress::Baseline);
        assert_eq!(integrator.turns(), before);
    }

    #[tokio::test]
    async fn reports_spins_exactly_once_and_releases_sensor() {
        let readings = (0..=8).map(|i| SensorReading::gyroscope(i * SECOND, 3.0)).collect();
        let sensors =
            Arc::new(SimulatedSensors::new().with_script(SensorKind::Gyroscope, readings));
        let source = RotationSource::new(sensors.clone(), RotationConfig::default());
        let (tx, mut rx) = mpsc::channel(16);

        source.start(SignalSink::new(ConditionId::DeviceSpin, tx.clone())).await;
        // Already complete: a restart reports nothing.
        source.start(SignalSink::new(ConditionId::DeviceSpin, tx)).await;

        match rx.recv().await {
            Some(SourceOutput::Signal(event)) => {
                assert!(event.passed);
                assert_eq!(event.status, "✔ 2 Spins Detected!");
            }
            other => panic!("unexpected output: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
        assert_eq!(sensors.active_count(SensorKind::Gyroscope), 0);
        assert_eq!(sensors.registrations(SensorKind::Gyroscope), 1);
    }

    #[tokio::test]
    async fn missing_gyroscope_fails() {
        let sensors = Arc::new(SimulatedSensors::new().without(SensorKind::Gyroscope));
        let source = RotationSource::new(sensors, RotationConfig::default());
        let (tx, mut rx) = mpsc::channel(4);

        source.start(SignalSink::new(ConditionId::DeviceSpin, tx)).await;

        match rx.recv().await {
            Some(SourceOutput::Signal(event)) => {
                assert!(!event.passed);
                assert_eq!(event.status, "❌ No Gyroscope");
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn lone_first_reading_reports_nothing() {
        let sensors = Arc::new(
            SimulatedSensors::new()
                .with_script(SensorKind::Gyroscope, vec![SensorReading::gyroscope(0, 50.0)]),
        );
        let source = Arc::new(RotationSource::new(sensors.clone(), RotationConfig::default()));
        let (tx, mut rx) = mpsc::channel(16);

        let task = tokio::spawn({
            let source = source.clone();
            async move { source.start(SignalSink::new(ConditionId::DeviceSpin, tx)).await }
        });
        while sensors.active_count(SensorKind::Gyroscope) == 0 {
            tokio::task::yield_now().await;
        }

        // Closing the stream lets the start task drain the baseline reading.
        source.stop();
        task.await.unwrap();

        assert!(rx.recv().await.is_none());
        assert_eq!(sensors.registrations(SensorKind::Gyroscope), 1);
    }
}
