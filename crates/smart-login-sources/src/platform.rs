//! Contracts of the platform collaborators consumed by the signal sources.
//!
//! Every collaborator is injected as a shared `Arc<dyn Trait>` handle owned
//! by the hosting session; no source assumes exclusive ownership. Calls
//! that wait on the user or on a platform service are `async` and suspend
//! the calling source only.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::{FactStoreError, PlatformResult};

/// Runtime permissions the sources depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    BluetoothScan,
    BluetoothConnect,
    FineLocation,
    RecordAudio,
    ReadPhoneState,
    ReadCallLog,
    ReadContacts,
    ReadPhoneNumbers,
}

/// Needed before any proximity scan.
pub const BLUETOOTH_PERMISSIONS: &[Permission] = &[
    Permission::BluetoothScan,
    Permission::BluetoothConnect,
    Permission::FineLocation,
];

/// Needed before launching speech recognition.
pub const MICROPHONE_PERMISSIONS: &[Permission] = &[Permission::RecordAudio];

/// Needed for the call observer to resolve callers.
pub const CALL_PERMISSIONS: &[Permission] = &[
    Permission::ReadPhoneState,
    Permission::ReadCallLog,
    Permission::ReadContacts,
    Permission::ReadPhoneNumbers,
];

/// Per-permission answer to a permission request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionGrant {
    pub granted: Vec<Permission>,
    pub denied: Vec<Permission>,
}

impl PermissionGrant {
    pub fn all_granted(&self) -> bool {
        self.denied.is_empty()
    }
}

#[async_trait]
pub trait PermissionAuthority: Send + Sync {
    /// True iff every listed permission is currently held.
    fn has_permissions(&self, permissions: &[Permission]) -> bool;

    /// Ask the user; suspends until the permission-result callback arrives.
    async fn request(&self, permissions: &[Permission]) -> PermissionGrant;
}

/// Identifies one registered listener (sensor or discovery receiver).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A peer seen by the proximity radio. Names are optional on the air.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub name: Option<String>,
}

impl Peer {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { name: None }
    }
}

/// Events delivered to a discovery subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    PeerFound(Peer),
    DiscoveryFinished,
}

/// A registered discovery receiver.
#[derive(Debug)]
pub struct DiscoverySubscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<DiscoveryEvent>,
}

#[async_trait]
pub trait ProximityRadio: Send + Sync {
    fn is_supported(&self) -> bool;

    fn is_enabled(&self) -> bool;

    /// Ask the user to switch the radio on; suspends for the result.
    async fn request_enable(&self) -> bool;

    /// Peers already connected (service bind round trip).
    async fn connected_peers(&self) -> PlatformResult<Vec<Peer>>;

    /// Register a discovery receiver and start a scan.
    fn start_discovery(&self) -> PlatformResult<DiscoverySubscription>;

    /// Stop an in-progress scan. No-op when not discovering.
    fn cancel_discovery(&self);

    /// Unregister a discovery receiver. Unknown or released ids are a no-op.
    fn unsubscribe(&self, id: SubscriptionId);
}

pub trait LocationService: Send + Sync {
    /// Synchronous poll; there is no subscription.
    fn is_enabled(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Gyroscope,
    Light,
}

/// A timestamped sensor sample.
///
/// Gyroscope: angular rate in rad/s around x, y, z. Light: `values[0]` is
/// illuminance in lux.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    /// Device clock, nanoseconds
    pub timestamp_ns: i64,
    pub values: [f32; 3],
}

impl SensorReading {
    pub fn gyroscope(timestamp_ns: i64, z_rate: f32) -> Self {
        Self {
            timestamp_ns,
            values: [0.0, 0.0, z_rate],
        }
    }

    pub fn light(timestamp_ns: i64, lux: f32) -> Self {
        Self {
            timestamp_ns,
            values: [lux, 0.0, 0.0],
        }
    }
}

/// A registered sensor listener.
#[derive(Debug)]
pub struct SensorSubscription {
    pub id: SubscriptionId,
    pub readings: mpsc::Receiver<SensorReading>,
}

pub trait MotionSensors: Send + Sync {
    fn has_sensor(&self, kind: SensorKind) -> bool;

    fn register(&self, kind: SensorKind) -> PlatformResult<SensorSubscription>;

    /// Unknown or released ids are a no-op.
    fn unregister(&self, id: SubscriptionId);
}

/// Result of one round trip to the external speech recogniser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Best transcript
    Transcript(String),
    Cancelled,
    /// No recogniser component on this device
    Unavailable,
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, prompt: &str, locale: &str) -> RecognitionOutcome;
}

pub trait ContactDirectory: Send + Sync {
    /// Display name stored for a phone number, if any.
    fn display_name(&self, number: &str) -> PlatformResult<Option<String>>;
}

/// Keys touched by one fact-store write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactChange {
    pub keys: Vec<String>,
}

impl FactChange {
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Persisted key-value facts that outlive the process.
///
/// Last write wins; there is no versioning. Every write is announced to
/// subscribers.
pub trait FactStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Write several keys as one change.
    fn put_all(&self, entries: &[(&str, String)]) -> Result<(), FactStoreError>;

    fn subscribe(&self) -> broadcast::Receiver<FactChange>;
}
