//! Smart Login Sources - the five signal sources and their platform seams.
//!
//! Each source implements [`SignalSource`](smart_login_gate::SignalSource)
//! over injected platform collaborators:
//!
//! | Source | Condition | Kind |
//! |--------|-----------|------|
//! | [`BluetoothProximitySource`] | target peer nearby | action-triggered |
//! | [`VoiceSource`] | spoken password | action-triggered |
//! | [`CallMatchSource`] | name of last caller | user input |
//! | [`RotationSource`] | two full spins | automatic |
//! | [`LightSource`] | room is bright | automatic |
//!
//! Device services are reached only through the traits in [`platform`];
//! [`simulated`] provides deterministic implementations of all of them.
//! The [`CallObserver`] records incoming callers into a [`FactStore`]
//! outside of any session.

pub mod bluetooth;
pub mod call_match;
pub mod caller;
pub mod config;
pub mod error;
pub mod facts;
pub mod light;
pub mod platform;
pub mod rotation;
pub mod session;
pub mod simulated;
pub mod voice;

pub use bluetooth::{BluetoothProximitySource, ProximityResolution, ProximityState};
pub use call_match::{caller_matches, CallMatchSource};
pub use caller::{CallObserver, PhoneState};
pub use config::{BluetoothConfig, LightConfig, RotationConfig, SourcesConfig, VoiceConfig};
pub use error::{FactStoreError, ObserverError, PlatformError, PlatformResult};
pub use facts::{InMemoryFactStore, JsonFactStore, LAST_CALLER_NAME, LAST_CALL_TIMESTAMP};
pub use light::{is_bright, LightSource};
pub use platform::{
    ContactDirectory, DiscoveryEvent, DiscoverySubscription, FactChange, FactStore,
    LocationService, MotionSensors, Peer, Permission, PermissionAuthority, PermissionGrant,
    ProximityRadio, RecognitionOutcome, SensorKind, SensorReading, SensorSubscription,
    SpeechRecognizer, SubscriptionId,
};
pub use rotation::{RotationIntegrator, RotationProgress, RotationSource};
pub use session::{build_sources, Platform};
pub use voice::{password_matches, VoiceSource};
