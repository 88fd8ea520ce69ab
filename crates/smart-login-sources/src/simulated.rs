//! Simulated platform collaborators.
//!
//! Deterministic stand-ins for the device services, used by the tests and
//! by the demo binary. Each records how it was driven so callers can
//! assert on subscriptions and requests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::platform::{
    ContactDirectory, DiscoveryEvent, DiscoverySubscription, LocationService, MotionSensors, Peer,
    Permission, PermissionAuthority, PermissionGrant, ProximityRadio, RecognitionOutcome,
    SensorKind, SensorReading, SensorSubscription, SpeechRecognizer, SubscriptionId,
};

const STREAM_HEADROOM: usize = 64;

/// Permission authority with a fixed answer per permission.
pub struct SimulatedPermissions {
    held: Mutex<HashSet<Permission>>,
    refused: HashSet<Permission>,
    requests: AtomicUsize,
}

impl SimulatedPermissions {
    /// Every permission is already held.
    pub fn granting_all() -> Self {
        Self {
            held: Mutex::new(ALL_PERMISSIONS.iter().copied().collect()),
            refused: HashSet::new(),
            requests: AtomicUsize::new(0),
        }
    }

    /// Nothing is held; a request grants everything asked for.
    pub fn prompting() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            refused: HashSet::new(),
            requests: AtomicUsize::new(0),
        }
    }

    /// Nothing is held; a request refuses the listed permissions.
    pub fn denying(refused: &[Permission]) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            refused: refused.iter().copied().collect(),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

const ALL_PERMISSIONS: &[Permission] = &[
    Permission::BluetoothScan,
    Permission::BluetoothConnect,
    Permission::FineLocation,
    Permission::RecordAudio,
    Permission::ReadPhoneState,
    Permission::ReadCallLog,
    Permission::ReadContacts,
    Permission::ReadPhoneNumbers,
];

#[async_trait]
impl PermissionAuthority for SimulatedPermissions {
    fn has_permissions(&self, permissions: &[Permission]) -> bool {
        let held = self.held.lock();
        permissions.iter().all(|p| held.contains(p))
    }

    async fn request(&self, permissions: &[Permission]) -> PermissionGrant {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (denied, granted): (Vec<Permission>, Vec<Permission>) = permissions
            .iter()
            .copied()
            .partition(|p| self.refused.contains(p));

        self.held.lock().extend(granted.iter().copied());
        debug!(?granted, ?denied, "Simulated permission request");
        PermissionGrant { granted, denied }
    }
}

/// Proximity radio replaying a scripted discovery.
pub struct SimulatedRadio {
    supported: bool,
    enabled: AtomicBool,
    accept_enable: bool,
    connected: Vec<Peer>,
    peer_query_fails: bool,
    discovery_script: Vec<DiscoveryEvent>,
    open_discovery: bool,
    receivers: Mutex<HashMap<SubscriptionId, mpsc::Sender<DiscoveryEvent>>>,
    discoveries_started: AtomicUsize,
    cancellations: AtomicUsize,
}

impl SimulatedRadio {
    /// Supported and switched on, with nothing nearby.
    pub fn new() -> Self {
        Self {
            supported: true,
            enabled: AtomicBool::new(true),
            accept_enable: true,
            connected: Vec::new(),
            peer_query_fails: false,
            discovery_script: Vec::new(),
            open_discovery: false,
            receivers: Mutex::new(HashMap::new()),
            discoveries_started: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            enabled: AtomicBool::new(false),
            ..Self::new()
        }
    }

    /// Switched off; `accept_enable` is the user's answer to the prompt.
    pub fn disabled(self, accept_enable: bool) -> Self {
        self.enabled.store(false, Ordering::SeqCst);
        Self {
            accept_enable,
            ..self
        }
    }

    pub fn with_connected(mut self, peers: Vec<Peer>) -> Self {
        self.connected = peers;
        self
    }

    /// The connected-peer query errors instead of answering.
    pub fn failing_peer_query(mut self) -> Self {
        self.peer_query_fails = true;
        self
    }

    /// Events delivered on every discovery.
    pub fn with_discovery(mut self, events: Vec<DiscoveryEvent>) -> Self {
        self.discovery_script = events;
        self
    }

    /// Keep discovery running after the script until cancelled.
    pub fn with_open_discovery(mut self) -> Self {
        self.open_discovery = true;
        self
    }

    /// Push an event to every open discovery receiver.
    pub fn emit_discovery(&self, event: DiscoveryEvent) {
        for tx in self.receivers.lock().values() {
            let _ = tx.try_send(event.clone());
        }
    }

    pub fn discoveries_started(&self) -> usize {
        self.discoveries_started.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub fn active_receivers(&self) -> usize {
        self.receivers.lock().len()
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProximityRadio for SimulatedRadio {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_enabled(&self) -> bool {
        self.supported && self.enabled.load(Ordering::SeqCst)
    }

    async fn request_enable(&self) -> bool {
        if self.accept_enable {
            self.enabled.store(true, Ordering::SeqCst);
        }
        self.accept_enable
    }

    async fn connected_peers(&self) -> PlatformResult<Vec<Peer>> {
        if !self.supported {
            return Err(PlatformError::RadioUnsupported);
        }
        if self.peer_query_fails {
            return Err(PlatformError::QueryFailed("profile proxy lost".into()));
        }
        Ok(self.connected.clone())
    }

    fn start_discovery(&self) -> PlatformResult<DiscoverySubscription> {
        if !self.is_enabled() {
            return Err(PlatformError::ServiceUnbound("radio off".into()));
        }
        self.discoveries_started.fetch_add(1, Ordering::SeqCst);

        let (tx, events) = mpsc::channel(self.discovery_script.len() + STREAM_HEADROOM);
        for event in &self.discovery_script {
            let _ = tx.try_send(event.clone());
        }

        let id = SubscriptionId::new();
        if self.open_discovery {
            self.receivers.lock().insert(id, tx);
        }
        Ok(DiscoverySubscription { id, events })
    }

    fn cancel_discovery(&self) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.receivers.lock().remove(&id);
    }
}

pub struct SimulatedLocation {
    enabled: AtomicBool,
}

impl SimulatedLocation {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl LocationService for SimulatedLocation {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// Motion and environment sensors.
///
/// A scripted batch of readings is delivered to the first registration of
/// each kind; later readings are pushed with [`emit`](Self::emit).
/// Streams stay open until unregistered.
pub struct SimulatedSensors {
    missing: HashSet<SensorKind>,
    scripts: Mutex<HashMap<SensorKind, Vec<SensorReading>>>,
    active: Mutex<HashMap<SubscriptionId, (SensorKind, mpsc::Sender<SensorReading>)>>,
    registrations: Mutex<HashMap<SensorKind, usize>>,
}

impl SimulatedSensors {
    pub fn new() -> Self {
        Self {
            missing: HashSet::new(),
            scripts: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            registrations: Mutex::new(HashMap::new()),
        }
    }

    pub fn without(mut self, kind: SensorKind) -> Self {
        self.missing.insert(kind);
        self
    }

    pub fn with_script(self, kind: SensorKind, readings: Vec<SensorReading>) -> Self {
        self.scripts.lock().insert(kind, readings);
        self
    }

    /// Deliver a reading to every active listener of `kind`.
    pub fn emit(&self, kind: SensorKind, reading: SensorReading) {
        for (registered, tx) in self.active.lock().values() {
            if *registered == kind {
                let _ = tx.try_send(reading);
            }
        }
    }

    pub fn active_count(&self, kind: SensorKind) -> usize {
        self.active
            .lock()
            .values()
            .filter(|(registered, _)| *registered == kind)
            .count()
    }

    pub fn registrations(&self, kind: SensorKind) -> usize {
        self.registrations.lock().get(&kind).copied().unwrap_or(0)
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionSensors for SimulatedSensors {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        !self.missing.contains(&kind)
    }

    fn register(&self, kind: SensorKind) -> PlatformResult<SensorSubscription> {
        if self.missing.contains(&kind) {
            return Err(PlatformError::SensorMissing(kind));
        }
        *self.registrations.lock().entry(kind).or_insert(0) += 1;

        let script = self.scripts.lock().remove(&kind).unwrap_or_default();
        let (tx, readings) = mpsc::channel(script.len() + STREAM_HEADROOM);
        for reading in script {
            let _ = tx.try_send(reading);
        }

        let id = SubscriptionId::new();
        self.active.lock().insert(id, (kind, tx));
        debug!(?kind, subscription = %id, "Simulated sensor registered");
        Ok(SensorSubscription { id, readings })
    }

    fn unregister(&self, id: SubscriptionId) {
        self.active.lock().remove(&id);
    }
}

/// Speech recogniser answering from a queue. An empty queue cancels.
pub struct SimulatedRecognizer {
    outcomes: Mutex<VecDeque<RecognitionOutcome>>,
    calls: AtomicUsize,
}

impl SimulatedRecognizer {
    pub fn new(outcomes: Vec<RecognitionOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, outcome: RecognitionOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for SimulatedRecognizer {
    async fn recognize(&self, prompt: &str, locale: &str) -> RecognitionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(prompt, locale, "Simulated recognition");
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(RecognitionOutcome::Cancelled)
    }
}

#[derive(Default)]
pub struct SimulatedContacts {
    names: HashMap<String, String>,
}

impl SimulatedContacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(mut self, number: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(number.into(), name.into());
        self
    }
}

impl ContactDirectory for SimulatedContacts {
    fn display_name(&self, number: &str) -> PlatformResult<Option<String>> {
        Ok(self.names.get(number).cloned())
    }
}
