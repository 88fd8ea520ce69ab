use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::ConditionId;

/// Why a condition is currently failing.
///
/// Every kind is terminal for the current attempt and non-fatal to the
/// session: it surfaces as status text with `passed = false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// A required runtime permission was refused
    PermissionDenied,
    /// No radio, sensor or recogniser on this device, or it errored
    ServiceUnavailable,
    /// Radio or location switched off; recoverable by the user
    ServiceDisabled,
    /// Scan or recognition finished without a match
    NotFound,
    /// No data yet (e.g. no caller ever recorded)
    Unresolved,
}

impl FailureKind {
    /// Failures that also direct the user to system settings.
    pub fn needs_remediation(&self) -> bool {
        matches!(
            self,
            FailureKind::PermissionDenied | FailureKind::ServiceDisabled
        )
    }
}

/// A status report from a signal source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub condition: ConditionId,
    pub status: String,
    pub passed: bool,
    /// Set only on failing reports that carry a classification
    pub failure: Option<FailureKind>,
    pub at: DateTime<Utc>,
}

impl SignalEvent {
    /// A passing report.
    pub fn passed(condition: ConditionId, status: impl Into<String>) -> Self {
        Self {
            condition,
            status: status.into(),
            passed: true,
            failure: None,
            at: Utc::now(),
        }
    }

    /// A failing report with a classification.
    pub fn failed(condition: ConditionId, status: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            condition,
            status: status.into(),
            passed: false,
            failure: Some(kind),
            at: Utc::now(),
        }
    }

    /// A not-yet-passing progress report (e.g. "Scanning...").
    pub fn progress(condition: ConditionId, status: impl Into<String>) -> Self {
        Self {
            condition,
            status: status.into(),
            passed: false,
            failure: None,
            at: Utc::now(),
        }
    }
}

/// Where a remediation prompt sends the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationTarget {
    /// This application's permission settings
    AppSettings,
    /// System location settings
    LocationSettings,
}

/// User-facing prompts raised by sources alongside (or instead of) status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    /// Dialog directing the user to settings. No automatic re-check follows.
    Remediation {
        condition: ConditionId,
        target: RemediationTarget,
        title: String,
        message: String,
    },
    /// Short non-blocking message; never changes condition state.
    Toast { condition: ConditionId, message: String },
}

impl Notice {
    pub fn condition(&self) -> ConditionId {
        match self {
            Notice::Remediation { condition, .. } | Notice::Toast { condition, .. } => *condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_permission_and_disabled_need_remediation() {
        assert!(FailureKind::PermissionDenied.needs_remediation());
        assert!(FailureKind::ServiceDisabled.needs_remediation());
        assert!(!FailureKind::ServiceUnavailable.needs_remediation());
        assert!(!FailureKind::NotFound.needs_remediation());
        assert!(!FailureKind::Unresolved.needs_remediation());
    }

    #[test]
    fn progress_is_not_a_classified_failure() {
        let e = SignalEvent::progress(ConditionId::BluetoothDevice, "🔍 Scanning...");
        assert!(!e.passed);
        assert!(e.failure.is_none());
    }
}
