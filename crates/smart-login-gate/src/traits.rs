use async_trait::async_trait;
use smart_login_types::{ConditionId, ConditionKind, SignalEvent};

use crate::error::{GateError, GateResult};
use crate::sink::SignalSink;

/// An independent asynchronous producer of pass/fail evidence for one
/// condition.
///
/// Each source owns its private state machine and its collaborator handles.
/// The controller runs `start` on its own task, so a source may suspend on
/// permission results, service callbacks or sensor streams without holding
/// up any other source.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// The condition this source reports on.
    fn condition(&self) -> ConditionId;

    fn kind(&self) -> ConditionKind {
        self.condition().default_kind()
    }

    /// Run one attempt (action-triggered) or monitor until terminal or
    /// stopped (automatic and input-driven sources).
    async fn start(&self, sink: SignalSink);

    /// Re-derive status from user-typed input.
    ///
    /// Only input-driven sources accept text; evaluation is synchronous so
    /// every keystroke produces exactly one status.
    fn input(&self, _text: &str) -> GateResult<SignalEvent> {
        Err(GateError::ActionNotAccepted {
            condition: self.condition(),
            action: "text input",
        })
    }

    /// Release every registered subscription.
    ///
    /// Must be idempotent and must tolerate subscriptions that were never
    /// registered or were already released.
    fn stop(&self);
}
