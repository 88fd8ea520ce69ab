use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use smart_login_types::{ConditionId, FailureKind, SignalEvent};

use crate::error::{GateError, GateResult};
use crate::sink::SignalSink;
use crate::traits::SignalSource;

/// One step replayed by a [`ScriptedSource`].
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Pass(String),
    Fail(String, FailureKind),
    Progress(String),
    Toast(String),
}

/// Scripted signal source for testing.
///
/// Replays a fixed list of steps on every start and counts starts and
/// stops. Input-driven conditions can be given an expected input.
pub struct ScriptedSource {
    condition: ConditionId,
    steps: Vec<ScriptStep>,
    expected_input: Option<String>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(condition: ConditionId, steps: Vec<ScriptStep>) -> Self {
        Self {
            condition,
            steps,
            expected_input: None,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// A source that reports a single pass.
    pub fn passing(condition: ConditionId, status: impl Into<String>) -> Self {
        Self::new(condition, vec![ScriptStep::Pass(status.into())])
    }

    /// A source that reports a single classified failure.
    pub fn failing(condition: ConditionId, status: impl Into<String>, kind: FailureKind) -> Self {
        Self::new(condition, vec![ScriptStep::Fail(status.into(), kind)])
    }

    /// A source that only raises a toast.
    pub fn toasting(condition: ConditionId, message: impl Into<String>) -> Self {
        Self::new(condition, vec![ScriptStep::Toast(message.into())])
    }

    /// An input-driven source that passes on an exact match.
    pub fn matching_input(condition: ConditionId, expected: impl Into<String>) -> Self {
        let mut source = Self::new(condition, vec![]);
        source.expected_input = Some(expected.into());
        source
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for ScriptedSource {
    fn condition(&self) -> ConditionId {
        self.condition
    }

    async fn start(&self, sink: SignalSink) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        for step in &self.steps {
            match step {
                ScriptStep::Pass(status) => sink.pass(status.clone()).await,
                ScriptStep::Fail(status, kind) => sink.fail(status.clone(), *kind).await,
                ScriptStep::Progress(status) => sink.progress(status.clone()).await,
                ScriptStep::Toast(message) => sink.toast(message.clone()).await,
            }
        }
    }

    fn input(&self, text: &str) -> GateResult<SignalEvent> {
        let expected = self
            .expected_input
            .as_deref()
            .ok_or(GateError::ActionNotAccepted {
                condition: self.condition,
                action: "text input",
            })?;

        Ok(if text == expected {
            SignalEvent::passed(self.condition, "✔ matched")
        } else {
            SignalEvent::failed(self.condition, "❌ mismatch", FailureKind::NotFound)
        })
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
