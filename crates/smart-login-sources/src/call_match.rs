//! Caller-name challenge.
//!
//! The user types the name of whoever last called. The expected name is the
//! persisted fact written by [`CallObserver`](crate::caller::CallObserver);
//! it is reloaded whenever the observer records a new call, and the current
//! input is re-evaluated against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use smart_login_gate::{GateResult, SignalSink, SignalSource};
use smart_login_types::{ConditionId, FailureKind, RemediationTarget, SignalEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::facts::LAST_CALLER_NAME;
use crate::platform::{FactStore, PermissionAuthority, CALL_PERMISSIONS};

/// Trimmed, case-insensitive equality.
pub fn caller_matches(input: &str, caller: &str) -> bool {
    input.trim().to_lowercase() == caller.trim().to_lowercase()
}

pub struct CallMatchSource {
    permissions: Arc<dyn PermissionAuthority>,
    facts: Arc<dyn FactStore>,
    caller: RwLock<Option<String>>,
    last_input: RwLock<String>,
    permission_requested: AtomicBool,
}

impl CallMatchSource {
    pub fn new(permissions: Arc<dyn PermissionAuthority>, facts: Arc<dyn FactStore>) -> Self {
        Self {
            permissions,
            facts,
            caller: RwLock::new(None),
            last_input: RwLock::new(String::new()),
            permission_requested: AtomicBool::new(false),
        }
    }

    fn reload(&self) {
        let caller = self
            .facts
            .get(LAST_CALLER_NAME)
            .filter(|name| !name.trim().is_empty());
        debug!(known = caller.is_some(), "Reloaded last caller");
        *self.caller.write() = caller;
    }

    fn evaluate(&self, input: &str) -> SignalEvent {
        let condition = ConditionId::CallMatch;
        let caller = self.caller.read();

        match caller.as_deref() {
            None => SignalEvent::failed(condition, "❌ No recent call", FailureKind::Unresolved),
            Some(_) if input.trim().is_empty() => {
                SignalEvent::progress(condition, "Enter caller name...")
            }
            Some(name) if caller_matches(input, name) => {
                SignalEvent::passed(condition, "✔ Caller matched")
            }
            Some(_) => SignalEvent::failed(condition, "❌ Incorrect name", FailureKind::NotFound),
        }
    }

    fn evaluate_current(&self) -> SignalEvent {
        let input = self.last_input.read().clone();
        self.evaluate(&input)
    }

    /// Ask for telephony permissions the first time only.
    async fn request_permissions_once(&self, sink: &SignalSink) {
        if self.permissions.has_permissions(CALL_PERMISSIONS)
            || self.permission_requested.swap(true, Ordering::SeqCst)
        {
            return;
        }

        let grant = self.permissions.request(CALL_PERMISSIONS).await;
        if !grant.all_granted() {
            info!(denied = ?grant.denied, "Call permissions denied");
            sink.remediate(
                RemediationTarget::AppSettings,
                "Permissions Required",
                "Call permissions are required to get your password.",
            )
            .await;
        }
    }
}

#[async_trait]
impl SignalSource for CallMatchSource {
    fn condition(&self) -> ConditionId {
        ConditionId::CallMatch
    }

    async fn start(&self, sink: SignalSink) {
        // Subscribe first so a write between the read and the subscription
        // is not missed.
        let mut changes = self.facts.subscribe();
        self.reload();
        sink.report(self.evaluate_current()).await;

        // The recorded caller is readable without call-log access.
        self.request_permissions_once(&sink).await;

        loop {
            match changes.recv().await {
                Ok(change) if change.touches(LAST_CALLER_NAME) => {
                    info!("Caller updated");
                    self.reload();
                    sink.report(self.evaluate_current()).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed fact changes, reloading");
                    self.reload();
                    sink.report(self.evaluate_current()).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn input(&self, text: &str) -> GateResult<SignalEvent> {
        *self.last_input.write() = text.to_string();
        Ok(self.evaluate(text))
    }

    // The fact subscription lives on the start task and ends with it.
    fn stop(&self) {}
}
