use std::collections::HashMap;
use std::sync::Arc;

use smart_login_types::{Condition, ConditionId, ConditionKind, Notice, SignalEvent};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use crate::sink::{SignalSink, SourceOutput};
use crate::store::{ConditionChange, ConditionStore};
use crate::traits::SignalSource;

/// Lifecycle of a login session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Sources running, gate closed
    Gathering,
    /// User navigated away; subscriptions released
    Paused,
    /// Gate opened. Terminal: no re-entry into the gate.
    Authenticated,
}

/// Actions forwarded from presentation.
#[derive(Clone, Debug, PartialEq)]
pub enum UserAction {
    Tap(ConditionId),
    TextChanged(ConditionId, String),
}

/// Result of an accepted login attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// At least one condition not passed. No per-condition explanation.
    Denied,
    Authenticated,
}

/// Updates pushed to presentation.
#[derive(Clone, Debug)]
pub enum SessionUpdate {
    /// Full ordered snapshot, sent when monitoring (re)starts
    Snapshot(Vec<Condition>),
    /// One row changed
    ConditionChanged(ConditionChange),
    Notice(Notice),
    Login(LoginOutcome),
    /// A command was refused
    Rejected(GateError),
}

/// Commands accepted by the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    Action(UserAction),
    AttemptLogin,
    Pause,
    Resume,
    Shutdown,
}

/// The Aggregation Controller - single consumer of all signal sources.
///
/// Owns the condition store. Every source reports through one bounded
/// channel, so store mutation is serialised onto whichever task drives the
/// controller; no locking is needed around the store. The aggregate gate is
/// a pure conjunction and is insensitive to arrival order.
pub struct AggregationController {
    session_id: Uuid,
    store: ConditionStore,
    state: SessionState,
    sources: HashMap<ConditionId, Arc<dyn SignalSource>>,
    tasks: HashMap<ConditionId, JoinHandle<()>>,
    signal_tx: mpsc::Sender<SourceOutput>,
    signal_rx: mpsc::Receiver<SourceOutput>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl AggregationController {
    /// Create a controller over the given sources.
    ///
    /// Source order is presentation order. Each source seeds one pending
    /// condition.
    pub fn new(config: &GateConfig, sources: Vec<Arc<dyn SignalSource>>) -> GateResult<Self> {
        let conditions = sources
            .iter()
            .map(|s| Condition::pending(s.condition(), s.kind()))
            .collect();
        let store = ConditionStore::new(conditions)?;

        let sources = sources.into_iter().map(|s| (s.condition(), s)).collect();
        let (signal_tx, signal_rx) = mpsc::channel(config.signal_buffer.max(1));
        let (updates, _) = broadcast::channel(config.update_buffer.max(1));

        Ok(Self {
            session_id: Uuid::new_v4(),
            store,
            state: SessionState::Gathering,
            sources,
            tasks: HashMap::new(),
            signal_tx,
            signal_rx,
            updates,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &ConditionStore {
        &self.store
    }

    pub fn snapshot(&self) -> Vec<Condition> {
        self.store.snapshot()
    }

    /// Subscribe to presentation updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Start every source that runs with the session.
    ///
    /// Action-triggered sources are never started here.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub fn start_session(&mut self) -> GateResult<()> {
        self.ensure_gathering()?;

        let background: Vec<Arc<dyn SignalSource>> = self
            .sources
            .values()
            .filter(|s| s.kind().starts_with_session())
            .cloned()
            .collect();

        info!(sources = background.len(), "Starting session monitoring");
        for source in background {
            self.spawn_source(source);
        }

        self.publish(SessionUpdate::Snapshot(self.store.snapshot()));
        Ok(())
    }

    /// Handle a user action forwarded by presentation.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub fn handle_action(&mut self, action: UserAction) -> GateResult<()> {
        self.ensure_gathering()?;

        match action {
            UserAction::Tap(id) => {
                let source = self.source(id)?;
                if source.kind() != ConditionKind::ActionTriggered {
                    return Err(GateError::ActionNotAccepted {
                        condition: id,
                        action: "tap",
                    });
                }
                self.spawn_source(source);
            }
            UserAction::TextChanged(id, text) => {
                let source = self.source(id)?;
                if source.kind() != ConditionKind::UserInput {
                    return Err(GateError::ActionNotAccepted {
                        condition: id,
                        action: "text input",
                    });
                }
                let event = source.input(&text)?;
                self.on_signal(event)?;
            }
        }

        Ok(())
    }

    /// Apply one status event to the store and notify presentation.
    pub fn on_signal(&mut self, event: SignalEvent) -> GateResult<ConditionChange> {
        let change = self.store.apply(&event)?;
        self.publish(SessionUpdate::ConditionChanged(change.clone()));
        Ok(change)
    }

    /// Evaluate the aggregate gate.
    ///
    /// Reads the store fresh on every call. Success is single use: the
    /// session becomes authenticated, all sources are stopped and further
    /// attempts are rejected.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub fn attempt_login(&mut self) -> GateResult<LoginOutcome> {
        if self.state == SessionState::Authenticated {
            warn!("Login attempted on an authenticated session");
            return Err(GateError::AlreadyAuthenticated);
        }

        if !self.store.all_passed() {
            debug!(outstanding = ?self.store.outstanding(), "Gate closed");
            info!("Login denied");
            self.publish(SessionUpdate::Login(LoginOutcome::Denied));
            return Ok(LoginOutcome::Denied);
        }

        self.state = SessionState::Authenticated;
        self.stop_sources();

        info!("Login granted, session authenticated");
        self.publish(SessionUpdate::Login(LoginOutcome::Authenticated));
        Ok(LoginOutcome::Authenticated)
    }

    /// Release every source subscription. Idempotent.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub fn pause(&mut self) {
        if self.state == SessionState::Gathering {
            self.state = SessionState::Paused;
        }
        self.stop_sources();
        debug!(state = ?self.state, "Session paused");
    }

    /// Restart background monitoring after a pause.
    pub fn resume(&mut self) -> GateResult<()> {
        match self.state {
            SessionState::Paused => {
                self.state = SessionState::Gathering;
                self.start_session()
            }
            SessionState::Gathering => Ok(()),
            SessionState::Authenticated => Err(GateError::SessionClosed),
        }
    }

    /// Apply every source output already queued, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(output) = self.signal_rx.try_recv() {
            self.on_output(output);
            processed += 1;
        }
        processed
    }

    /// Wait for the next source output and apply it.
    pub async fn process_next(&mut self) -> bool {
        match self.signal_rx.recv().await {
            Some(output) => {
                self.on_output(output);
                true
            }
            None => false,
        }
    }

    /// Drive the session until shutdown or until every handle is dropped.
    ///
    /// Source outputs are drained before commands so a login attempt sees
    /// every status already reported.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> SessionState {
        info!(session = %self.session_id, "Session loop started");

        loop {
            tokio::select! {
                biased;
                Some(output) = self.signal_rx.recv() => self.on_output(output),
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
        }

        self.stop_sources();
        info!(session = %self.session_id, state = ?self.state, "Session loop ended");
        self.state
    }

    /// Start the session and run it on its own task.
    pub fn spawn(
        mut self,
    ) -> GateResult<(
        SessionHandle,
        broadcast::Receiver<SessionUpdate>,
        JoinHandle<SessionState>,
    )> {
        let updates = self.subscribe();
        self.start_session()?;

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(self.run(rx));
        Ok((SessionHandle { commands: tx }, updates, task))
    }

    fn on_command(&mut self, command: SessionCommand) {
        debug!(command = ?command, "Session command");
        let result = match command {
            SessionCommand::Action(action) => self.handle_action(action),
            SessionCommand::AttemptLogin => self.attempt_login().map(|_| ()),
            SessionCommand::Pause => {
                self.pause();
                Ok(())
            }
            SessionCommand::Resume => self.resume(),
            SessionCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            warn!(error = %e, "Session command rejected");
            self.publish(SessionUpdate::Rejected(e));
        }
    }

    fn on_output(&mut self, output: SourceOutput) {
        match output {
            SourceOutput::Signal(event) => {
                if self.state == SessionState::Authenticated {
                    debug!(condition = %event.condition, "Ignoring status after authentication");
                    return;
                }
                if let Err(e) = self.on_signal(event) {
                    warn!(error = %e, "Dropping source status");
                }
            }
            SourceOutput::Notice(notice) => {
                debug!(condition = %notice.condition(), "Source notice");
                self.publish(SessionUpdate::Notice(notice));
            }
        }
    }

    fn spawn_source(&mut self, source: Arc<dyn SignalSource>) {
        let id = source.condition();
        if let Some(task) = self.tasks.get(&id) {
            if !task.is_finished() {
                debug!(condition = %id, "Source already running");
                return;
            }
        }

        debug!(condition = %id, kind = ?source.kind(), "Starting source");
        let sink = SignalSink::new(id, self.signal_tx.clone());
        let task = tokio::spawn(async move { source.start(sink).await });
        self.tasks.insert(id, task);
    }

    fn stop_sources(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
        for source in self.sources.values() {
            source.stop();
        }
    }

    fn source(&self, id: ConditionId) -> GateResult<Arc<dyn SignalSource>> {
        self.sources
            .get(&id)
            .cloned()
            .ok_or(GateError::UnknownCondition(id))
    }

    fn ensure_gathering(&self) -> GateResult<()> {
        match self.state {
            SessionState::Gathering => Ok(()),
            SessionState::Paused => Err(GateError::SessionPaused),
            SessionState::Authenticated => Err(GateError::SessionClosed),
        }
    }

    fn publish(&self, update: SessionUpdate) {
        // No subscribers is fine: presentation may not be attached.
        let _ = self.updates.send(update);
    }
}

impl Drop for AggregationController {
    fn drop(&mut self) {
        self.stop_sources();
    }
}

/// Presentation-side handle to a running session loop.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn tap(&self, id: ConditionId) -> GateResult<()> {
        self.send(SessionCommand::Action(UserAction::Tap(id))).await
    }

    pub async fn text_changed(&self, id: ConditionId, text: impl Into<String>) -> GateResult<()> {
        self.send(SessionCommand::Action(UserAction::TextChanged(id, text.into())))
            .await
    }

    pub async fn attempt_login(&self) -> GateResult<()> {
        self.send(SessionCommand::AttemptLogin).await
    }

    pub async fn pause(&self) -> GateResult<()> {
        self.send(SessionCommand::Pause).await
    }

    pub async fn resume(&self) -> GateResult<()> {
        self.send(SessionCommand::Resume).await
    }

    pub async fn shutdown(&self) -> GateResult<()> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, command: SessionCommand) -> GateResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GateError::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedSource;

    fn controller_with(sources: Vec<Arc<ScriptedSource>>) -> AggregationController {
        let sources = sources
            .into_iter()
            .map(|s| s as Arc<dyn SignalSource>)
            .collect();
        AggregationController::new(&GateConfig::default(), sources).unwrap()
    }

    #[test]
    fn rejects_empty_source_set() {
        let result = AggregationController::new(&GateConfig::default(), vec![]);
        assert!(matches!(result, Err(GateError::EmptyStore)));
    }

    #[tokio::test]
    async fn session_start_skips_action_triggered_sources() {
        let tap = Arc::new(ScriptedSource::passing(ConditionId::VoiceCommand, "✔"));
        let auto = Arc::new(ScriptedSource::passing(ConditionId::RoomBright, "✔"));
        let mut controller = controller_with(vec![tap.clone(), auto.clone()]);

        controller.start_session().unwrap();
        assert!(controller.process_next().await);

        assert_eq!(tap.starts(), 0);
        assert_eq!(auto.starts(), 1);
        assert!(controller.store().entry_for(ConditionId::RoomBright).unwrap().passed);
    }

    #[tokio::test]
    async fn tap_starts_action_triggered_source() {
        let tap = Arc::new(ScriptedSource::passing(ConditionId::VoiceCommand, "✔"));
        let mut controller = controller_with(vec![tap.clone()]);

        controller
            .handle_action(UserAction::Tap(ConditionId::VoiceCommand))
            .unwrap();
        assert!(controller.process_next().await);

        assert_eq!(tap.starts(), 1);
        assert_eq!(controller.attempt_login().unwrap(), LoginOutcome::Authenticated);
    }

    #[tokio::test]
    async fn tap_on_automatic_source_rejected() {
        let auto = Arc::new(ScriptedSource::passing(ConditionId::DeviceSpin, "✔"));
        let mut controller = controller_with(vec![auto]);

        let err = controller
            .handle_action(UserAction::Tap(ConditionId::DeviceSpin))
            .unwrap_err();
        assert!(matches!(err, GateError::ActionNotAccepted { .. }));
    }

    #[tokio::test]
    async fn text_input_applied_synchronously() {
        let input = Arc::new(ScriptedSource::matching_input(ConditionId::CallMatch, "Alex"));
        let mut controller = controller_with(vec![input]);

        controller
            .handle_action(UserAction::TextChanged(ConditionId::CallMatch, "Bob".into()))
            .unwrap();
        assert!(!controller.store().all_passed());

        controller
            .handle_action(UserAction::TextChanged(ConditionId::CallMatch, "Alex".into()))
            .unwrap();
        assert!(controller.store().all_passed());
    }

    #[tokio::test]
    async fn unknown_condition_surfaces_error() {
        let auto = Arc::new(ScriptedSource::passing(ConditionId::RoomBright, "✔"));
        let mut controller = controller_with(vec![auto]);

        let err = controller
            .on_signal(SignalEvent::passed(ConditionId::DeviceSpin, "✔"))
            .unwrap_err();
        assert_eq!(err, GateError::UnknownCondition(ConditionId::DeviceSpin));
    }

    #[tokio::test]
    async fn second_login_after_success_rejected() {
        let auto = Arc::new(ScriptedSource::passing(ConditionId::RoomBright, "✔"));
        let mut controller = controller_with(vec![auto.clone()]);

        controller.start_session().unwrap();
        controller.process_next().await;

        assert_eq!(controller.attempt_login().unwrap(), LoginOutcome::Authenticated);
        assert_eq!(controller.state(), SessionState::Authenticated);
        assert!(auto.stops() >= 1);

        assert_eq!(
            controller.attempt_login().unwrap_err(),
            GateError::AlreadyAuthenticated
        );
        assert_eq!(
            controller
                .handle_action(UserAction::Tap(ConditionId::RoomBright))
                .unwrap_err(),
            GateError::SessionClosed
        );
    }

    #[tokio::test]
    async fn pause_is_idempotent_and_blocks_actions() {
        let tap = Arc::new(ScriptedSource::passing(ConditionId::BluetoothDevice, "✔"));
        let mut controller = controller_with(vec![tap.clone()]);

        controller.pause();
        controller.pause();
        assert_eq!(controller.state(), SessionState::Paused);
        assert_eq!(tap.stops(), 2);

        assert_eq!(
            controller
                .handle_action(UserAction::Tap(ConditionId::BluetoothDevice))
                .unwrap_err(),
            GateError::SessionPaused
        );

        controller.resume().unwrap();
        assert_eq!(controller.state(), SessionState::Gathering);
    }

    #[tokio::test]
    async fn notices_are_forwarded_without_state_change() {
        let tap = Arc::new(ScriptedSource::toasting(
            ConditionId::VoiceCommand,
            "Recognizer unavailable",
        ));
        let mut controller = controller_with(vec![tap]);
        let mut updates = controller.subscribe();

        controller
            .handle_action(UserAction::Tap(ConditionId::VoiceCommand))
            .unwrap();
        controller.process_next().await;

        match updates.recv().await.unwrap() {
            SessionUpdate::Notice(Notice::Toast { message, .. }) => {
                assert_eq!(message, "Recognizer unavailable")
            }
            other => panic!("unexpected update: {:?}", other),
        }
        assert!(controller.store().entry_for(ConditionId::VoiceCommand).unwrap().is_pending());
    }
}
