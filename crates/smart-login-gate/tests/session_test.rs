//! End-to-end tests of the session loop driven through a `SessionHandle`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use smart_login_gate::{
    AggregationController, GateConfig, GateError, LoginOutcome, ScriptedSource, SessionState,
    SessionUpdate, SignalSource,
};
use smart_login_types::{ConditionId, Notice};
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn next_update(updates: &mut broadcast::Receiver<SessionUpdate>) -> SessionUpdate {
    timeout(WAIT, updates.recv())
        .await
        .expect("timed out waiting for update")
        .expect("update channel closed")
}

async fn next_login(updates: &mut broadcast::Receiver<SessionUpdate>) -> LoginOutcome {
    loop {
        if let SessionUpdate::Login(outcome) = next_update(updates).await {
            return outcome;
        }
    }
}

async fn wait_until_passed(
    updates: &mut broadcast::Receiver<SessionUpdate>,
    expected: &[ConditionId],
) {
    let mut passed = HashSet::new();
    while !expected.iter().all(|id| passed.contains(id)) {
        if let SessionUpdate::ConditionChanged(change) = next_update(updates).await {
            if change.condition.passed {
                passed.insert(change.condition.id);
            } else {
                passed.remove(&change.condition.id);
            }
        }
    }
}

fn five_sources() -> Vec<Arc<dyn SignalSource>> {
    vec![
        Arc::new(ScriptedSource::passing(
            ConditionId::BluetoothDevice,
            "✔ Connected to AirPods",
        )),
        Arc::new(ScriptedSource::passing(
            ConditionId::VoiceCommand,
            "✔ Password matched",
        )),
        Arc::new(ScriptedSource::matching_input(ConditionId::CallMatch, "Alex")),
        Arc::new(ScriptedSource::passing(
            ConditionId::DeviceSpin,
            "✔ 2 Spins Detected!",
        )),
        Arc::new(ScriptedSource::passing(
            ConditionId::RoomBright,
            "✔ Room is Bright",
        )),
    ]
}

#[tokio::test]
async fn login_opens_only_when_every_condition_passes() {
    let controller = AggregationController::new(&GateConfig::default(), five_sources()).unwrap();
    let (handle, mut updates, task) = controller.spawn().unwrap();

    match next_update(&mut updates).await {
        SessionUpdate::Snapshot(conditions) => {
            let ids: Vec<_> = conditions.iter().map(|c| c.id).collect();
            assert_eq!(ids, ConditionId::ALL.to_vec());
            assert!(conditions.iter().all(|c| c.is_pending()));
        }
        other => panic!("expected snapshot, got {:?}", other),
    }

    handle.tap(ConditionId::VoiceCommand).await.unwrap();
    handle.tap(ConditionId::BluetoothDevice).await.unwrap();
    wait_until_passed(
        &mut updates,
        &[
            ConditionId::VoiceCommand,
            ConditionId::BluetoothDevice,
            ConditionId::DeviceSpin,
            ConditionId::RoomBright,
        ],
    )
    .await;

    // Four of five is not enough.
    handle.attempt_login().await.unwrap();
    assert_eq!(next_login(&mut updates).await, LoginOutcome::Denied);

    handle
        .text_changed(ConditionId::CallMatch, "Alex")
        .await
        .unwrap();
    wait_until_passed(&mut updates, &[ConditionId::CallMatch]).await;

    handle.attempt_login().await.unwrap();
    assert_eq!(next_login(&mut updates).await, LoginOutcome::Authenticated);

    handle.attempt_login().await.unwrap();
    loop {
        if let SessionUpdate::Rejected(err) = next_update(&mut updates).await {
            assert_eq!(err, GateError::AlreadyAuthenticated);
            break;
        }
    }

    handle.shutdown().await.unwrap();
    assert_eq!(task.await.unwrap(), SessionState::Authenticated);
}

#[tokio::test]
async fn paused_session_rejects_taps_until_resumed() {
    let tap = Arc::new(ScriptedSource::passing(ConditionId::VoiceCommand, "✔"));
    let controller = AggregationController::new(
        &GateConfig::default(),
        vec![tap.clone() as Arc<dyn SignalSource>],
    )
    .unwrap();
    let (handle, mut updates, task) = controller.spawn().unwrap();

    handle.pause().await.unwrap();
    handle.tap(ConditionId::VoiceCommand).await.unwrap();
    loop {
        if let SessionUpdate::Rejected(err) = next_update(&mut updates).await {
            assert_eq!(err, GateError::SessionPaused);
            break;
        }
    }
    assert_eq!(tap.starts(), 0);

    handle.resume().await.unwrap();
    handle.tap(ConditionId::VoiceCommand).await.unwrap();
    wait_until_passed(&mut updates, &[ConditionId::VoiceCommand]).await;
    assert_eq!(tap.starts(), 1);

    drop(handle);
    assert_eq!(task.await.unwrap(), SessionState::Gathering);
}

#[tokio::test]
async fn notices_reach_presentation_without_changing_state() {
    let source = Arc::new(ScriptedSource::toasting(
        ConditionId::DeviceSpin,
        "Sensor calibrating",
    ));
    let controller = AggregationController::new(
        &GateConfig::default(),
        vec![source as Arc<dyn SignalSource>],
    )
    .unwrap();
    let (handle, mut updates, task) = controller.spawn().unwrap();

    loop {
        match next_update(&mut updates).await {
            SessionUpdate::Notice(Notice::Toast { message, .. }) => {
                assert_eq!(message, "Sensor calibrating");
                break;
            }
            SessionUpdate::ConditionChanged(change) => {
                panic!("notice changed a condition: {:?}", change)
            }
            _ => {}
        }
    }

    handle.attempt_login().await.unwrap();
    assert_eq!(next_login(&mut updates).await, LoginOutcome::Denied);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
