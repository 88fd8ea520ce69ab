use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::{FailureKind, SignalEvent};

/// Status text every condition starts with.
pub const PENDING_STATUS: &str = "Waiting...";

/// Stable identifier of a gating condition.
///
/// Used as the join key between signal events and store entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionId {
    /// Target Bluetooth peer connected or nearby
    BluetoothDevice,
    /// Spoken password recognised
    VoiceCommand,
    /// Typed name matches the most recent caller
    CallMatch,
    /// Device rotated twice around its z axis
    DeviceSpin,
    /// Ambient light above the brightness threshold
    RoomBright,
}

impl ConditionId {
    /// All condition ids in presentation order.
    pub const ALL: [ConditionId; 5] = [
        ConditionId::BluetoothDevice,
        ConditionId::VoiceCommand,
        ConditionId::CallMatch,
        ConditionId::DeviceSpin,
        ConditionId::RoomBright,
    ];

    /// Human-readable name shown next to the condition.
    pub fn display_name(&self) -> &'static str {
        match self {
            ConditionId::BluetoothDevice => "Bluetooth Device",
            ConditionId::VoiceCommand => "Voice Command",
            ConditionId::CallMatch => "Call Match",
            ConditionId::DeviceSpin => "Device Spin",
            ConditionId::RoomBright => "Room is bright",
        }
    }

    /// The kind this application assigns to each condition.
    pub fn default_kind(&self) -> ConditionKind {
        match self {
            ConditionId::BluetoothDevice | ConditionId::VoiceCommand => {
                ConditionKind::ActionTriggered
            }
            ConditionId::CallMatch => ConditionKind::UserInput,
            ConditionId::DeviceSpin | ConditionId::RoomBright => ConditionKind::Automatic,
        }
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Controls when a condition's signal source may do work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    /// Advanced by an explicit user action. Must never auto-start.
    ActionTriggered,
    /// Re-evaluated on every change of user-typed input.
    UserInput,
    /// Advanced purely by background monitoring from session start.
    Automatic,
}

impl ConditionKind {
    /// Whether the source backing this kind starts with the session.
    pub fn starts_with_session(&self) -> bool {
        !matches!(self, ConditionKind::ActionTriggered)
    }
}

/// One gating requirement and its most recent status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub kind: ConditionKind,
    /// Current status text shown to the user
    pub display_status: String,
    pub passed: bool,
    /// Classification of the most recent failing status, if any
    pub failure: Option<FailureKind>,
    /// When the last status was applied (None while pending)
    pub updated_at: Option<DateTime<Utc>>,
}

impl Condition {
    /// A condition in its pending sentinel state.
    pub fn pending(id: ConditionId, kind: ConditionKind) -> Self {
        Self {
            id,
            kind,
            display_status: PENDING_STATUS.to_string(),
            passed: false,
            failure: None,
            updated_at: None,
        }
    }

    /// Whether no status has been applied yet.
    pub fn is_pending(&self) -> bool {
        self.updated_at.is_none()
    }

    /// Apply a status event to this condition.
    pub fn apply(&mut self, event: &SignalEvent) {
        self.display_status = event.status.clone();
        self.passed = event.passed;
        self.failure = if event.passed { None } else { event.failure };
        self.updated_at = Some(event.at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ids_are_distinct_and_ordered() {
        let mut ids = ConditionId::ALL.to_vec();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], ConditionId::BluetoothDevice);
        assert_eq!(ids[4], ConditionId::RoomBright);
    }

    #[test]
    fn action_triggered_does_not_start_with_session() {
        assert!(!ConditionKind::ActionTriggered.starts_with_session());
        assert!(ConditionKind::UserInput.starts_with_session());
        assert!(ConditionKind::Automatic.starts_with_session());
    }

    #[test]
    fn pending_condition_has_sentinel_status() {
        let c = Condition::pending(ConditionId::DeviceSpin, ConditionKind::Automatic);
        assert_eq!(c.display_status, PENDING_STATUS);
        assert!(!c.passed);
        assert!(c.is_pending());
    }

    #[test]
    fn apply_clears_failure_on_pass() {
        let mut c = Condition::pending(ConditionId::RoomBright, ConditionKind::Automatic);
        c.apply(&SignalEvent::failed(
            ConditionId::RoomBright,
            "❌ Room is Dark",
            FailureKind::NotFound,
        ));
        assert_eq!(c.failure, Some(FailureKind::NotFound));
        assert!(!c.is_pending());

        c.apply(&SignalEvent::passed(ConditionId::RoomBright, "✔ Room is Bright"));
        assert!(c.passed);
        assert!(c.failure.is_none());
    }

    #[test]
    fn condition_id_displays_presentation_name() {
        assert_eq!(ConditionId::CallMatch.to_string(), "Call Match");
        let json = serde_json::to_string(&ConditionId::CallMatch).unwrap();
        assert_eq!(json, "\"CallMatch\"");
    }
}
