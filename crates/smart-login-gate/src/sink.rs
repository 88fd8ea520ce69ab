use smart_login_types::{ConditionId, FailureKind, Notice, RemediationTarget, SignalEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Everything a signal source can send to the controller.
#[derive(Clone, Debug)]
pub enum SourceOutput {
    /// Status update for the source's condition
    Signal(SignalEvent),
    /// Prompt for the user; never changes condition state
    Notice(Notice),
}

/// Reporting handle given to a signal source.
///
/// Bound to a single condition: a source can only ever report on the
/// condition it backs. Sends after the controller is gone are dropped.
#[derive(Clone, Debug)]
pub struct SignalSink {
    condition: ConditionId,
    tx: mpsc::Sender<SourceOutput>,
}

impl SignalSink {
    pub fn new(condition: ConditionId, tx: mpsc::Sender<SourceOutput>) -> Self {
        Self { condition, tx }
    }

    pub fn condition(&self) -> ConditionId {
        self.condition
    }

    /// Report the condition as passed.
    pub async fn pass(&self, status: impl Into<String>) {
        self.send(SourceOutput::Signal(SignalEvent::passed(self.condition, status)))
            .await;
    }

    /// Report a classified failure.
    pub async fn fail(&self, status: impl Into<String>, kind: FailureKind) {
        self.send(SourceOutput::Signal(SignalEvent::failed(
            self.condition,
            status,
            kind,
        )))
        .await;
    }

    /// Report an unclassified not-yet-passing status.
    pub async fn progress(&self, status: impl Into<String>) {
        self.send(SourceOutput::Signal(SignalEvent::progress(self.condition, status)))
            .await;
    }

    /// Forward a prepared event. Events for another condition are dropped.
    pub async fn report(&self, event: SignalEvent) {
        if event.condition != self.condition {
            warn!(
                sink = %self.condition,
                event = %event.condition,
                "Dropping event for foreign condition"
            );
            return;
        }
        self.send(SourceOutput::Signal(event)).await;
    }

    /// Direct the user to settings.
    pub async fn remediate(
        &self,
        target: RemediationTarget,
        title: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.send(SourceOutput::Notice(Notice::Remediation {
            condition: self.condition,
            target,
            title: title.into(),
            message: message.into(),
        }))
        .await;
    }

    /// Show a short non-blocking message.
    pub async fn toast(&self, message: impl Into<String>) {
        self.send(SourceOutput::Notice(Notice::Toast {
            condition: self.condition,
            message: message.into(),
        }))
        .await;
    }

    async fn send(&self, output: SourceOutput) {
        if self.tx.send(output).await.is_err() {
            debug!(condition = %self.condition, "Controller gone, dropping source output");
        }
    }
}
