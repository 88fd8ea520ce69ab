//! Proximity check for a paired peer such as a pair of earbuds.
//!
//! Each tap runs one attempt through the permission, location, radio,
//! connected-peer and discovery steps. Every step that waits on the user or
//! the platform is an await point; the attempt ends in a single `Resolved`
//! state that the next tap starts over from.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use smart_login_gate::{SignalSink, SignalSource};
use smart_login_types::{ConditionId, FailureKind, RemediationTarget};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::BluetoothConfig;
use crate::platform::{
    DiscoveryEvent, LocationService, Peer, PermissionAuthority, ProximityRadio, SubscriptionId,
    BLUETOOTH_PERMISSIONS,
};

/// How an attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProximityResolution {
    Found,
    NotFound,
    Unsupported,
    /// Permission, location or radio requirement not met
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProximityState {
    Idle,
    AwaitingPermission,
    AwaitingLocationService,
    AwaitingAdapterEnable,
    CheckingConnectedDevices,
    Scanning,
    Resolved(ProximityResolution),
}

pub struct BluetoothProximitySource {
    permissions: Arc<dyn PermissionAuthority>,
    radio: Arc<dyn ProximityRadio>,
    location: Arc<dyn LocationService>,
    config: BluetoothConfig,
    state: Mutex<ProximityState>,
    discovery: Mutex<Option<SubscriptionId>>,
}

impl BluetoothProximitySource {
    pub fn new(
        permissions: Arc<dyn PermissionAuthority>,
        radio: Arc<dyn ProximityRadio>,
        location: Arc<dyn LocationService>,
        config: BluetoothConfig,
    ) -> Self {
        Self {
            permissions,
            radio,
            location,
            config,
            state: Mutex::new(ProximityState::Idle),
            discovery: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ProximityState {
        *self.state.lock()
    }

    fn transition(&self, next: ProximityState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "Proximity state");
        *state = next;
    }

    fn matching_name<'a>(&self, peer: &'a Peer) -> Option<&'a str> {
        peer.name
            .as_deref()
            .filter(|name| name.contains(self.config.target_name.as_str()))
    }

    /// Cancel discovery and unregister its receiver. Safe to repeat.
    fn release_discovery(&self) {
        if let Some(id) = self.discovery.lock().take() {
            debug!(subscription = %id, "Releasing discovery receiver");
            self.radio.cancel_discovery();
            self.radio.unsubscribe(id);
        }
    }

    async fn attempt(&self, sink: &SignalSink) -> ProximityResolution {
        if !self.radio.is_supported() {
            sink.fail("❌ Bluetooth Not Supported", FailureKind::ServiceUnavailable)
                .await;
            return ProximityResolution::Unsupported;
        }

        if !self.permissions.has_permissions(BLUETOOTH_PERMISSIONS) {
            self.transition(ProximityState::AwaitingPermission);
            let grant = self.permissions.request(BLUETOOTH_PERMISSIONS).await;
            if !grant.all_granted() {
                info!(denied = ?grant.denied, "Bluetooth permissions denied");
                sink.fail("❌ Permission Denied", FailureKind::PermissionDenied)
                    .await;
                sink.remediate(
                    RemediationTarget::AppSettings,
                    "Permissions Required",
                    "Bluetooth permissions are required to detect your device.",
                )
                .await;
                return ProximityResolution::Blocked;
            }
        }

        if !self.location.is_enabled() {
            self.transition(ProximityState::AwaitingLocationService);
            sink.fail("❌ Location Off", FailureKind::ServiceDisabled)
                .await;
            sink.remediate(
                RemediationTarget::LocationSettings,
                "Location Required",
                "Please enable Location services to scan for Bluetooth devices.",
            )
            .await;
            return ProximityResolution::Blocked;
        }

        if !self.radio.is_enabled() {
            self.transition(ProximityState::AwaitingAdapterEnable);
            sink.fail("❌ Bluetooth Off", FailureKind::ServiceDisabled)
                .await;
            if !self.radio.request_enable().await {
                info!("User declined to enable Bluetooth");
                sink.toast("Bluetooth must be enabled").await;
                return ProximityResolution::Blocked;
            }
        }

        self.transition(ProximityState::CheckingConnectedDevices);
        match self.radio.connected_peers().await {
            Ok(peers) => {
                if let Some(name) = peers.iter().find_map(|peer| self.matching_name(peer)) {
                    info!(peer = %name, "Target already connected");
                    sink.pass(format!("✔ Connected to {}", name)).await;
                    return ProximityResolution::Found;
                }
            }
            Err(e) => {
                warn!(error = %e, "Connected peer query failed");
                sink.fail("❌ Bluetooth Unavailable", FailureKind::ServiceUnavailable)
                    .await;
                return ProximityResolution::Blocked;
            }
        }

        self.scan(sink).await
    }

    async fn scan(&self, sink: &SignalSink) -> ProximityResolution {
        self.transition(ProximityState::Scanning);
        sink.progress("🔍 Scanning...").await;

        // A receiver left over from an aborted attempt.
        self.release_discovery();
        let subscription = match self.radio.start_discovery() {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "Discovery failed to start");
                sink.fail("❌ Bluetooth Unavailable", FailureKind::ServiceUnavailable)
                    .await;
                return ProximityResolution::Blocked;
            }
        };
        *self.discovery.lock() = Some(subscription.id);

        // A timeout past the clock's range means no deadline at all.
        let deadline = Instant::now().checked_add(self.config.scan_timeout());
        if deadline.is_none() {
            warn!(
                timeout_secs = self.config.scan_timeout_secs,
                "Scan timeout out of range, waiting for discovery to finish"
            );
        }
        let mut events = subscription.events;
        let mut found = false;

        loop {
            let next = match deadline {
                Some(deadline) => timeout_at(deadline, events.recv()).await,
                None => Ok(events.recv().await),
            };
            match next {
                Ok(Some(DiscoveryEvent::PeerFound(peer))) => {
                    let Some(name) = self.matching_name(&peer) else {
                        continue;
                    };
                    if found {
                        continue;
                    }
                    found = true;
                    info!(peer = %name, "Target discovered");
                    sink.pass(format!("✔ {} Found", name)).await;
                    if self.config.stop_on_first_match {
                        break;
                    }
                }
                Ok(Some(DiscoveryEvent::DiscoveryFinished)) | Ok(None) => break,
                Err(_) => {
                    info!(
                        timeout_secs = self.config.scan_timeout_secs,
                        "Discovery timed out"
                    );
                    break;
                }
            }
        }

        self.release_discovery();

        if found {
            ProximityResolution::Found
        } else {
            sink.fail("❌ Not Found", FailureKind::NotFound).await;
            ProximityResolution::NotFound
        }
    }
}

#[async_trait]
impl SignalSource for BluetoothProximitySource {
    fn condition(&self) -> ConditionId {
        ConditionId::BluetoothDevice
    }

    #[instrument(skip(self, sink), fields(device = %self.config.target_name))]
    async fn start(&self, sink: SignalSink) {
        let resolution = self.attempt(&sink).await;
        debug!(?resolution, "Proximity attempt finished");
        self.transition(ProximityState::Resolved(resolution));
    }

    fn stop(&self) {
        self.release_discovery();
        // An interrupted attempt leaves nothing to resume.
        let mut state = self.state.lock();
        if !matches!(*state, ProximityState::Resolved(_)) {
            debug!(from = ?*state, "Proximity attempt interrupted");
            *state = ProximityState::Idle;
        }
    }
}
