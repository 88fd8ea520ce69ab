//! Incoming-call observer.
//!
//! Runs outside any login session. On every ringing call from a number
//! that resolves to a contact, it records the contact's display name and
//! the time of the call as persisted facts; the write itself is the
//! caller-updated notification seen by [`CallMatchSource`].
//!
//! [`CallMatchSource`]: crate::call_match::CallMatchSource

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ObserverError;
use crate::facts::{LAST_CALLER_NAME, LAST_CALL_TIMESTAMP};
use crate::platform::{ContactDirectory, FactStore};

/// Telephony state transitions delivered to the observer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhoneState {
    Idle,
    Ringing { number: Option<String> },
    OffHook,
}

pub struct CallObserver {
    contacts: Arc<dyn ContactDirectory>,
    facts: Arc<dyn FactStore>,
}

impl CallObserver {
    pub fn new(contacts: Arc<dyn ContactDirectory>, facts: Arc<dyn FactStore>) -> Self {
        Self { contacts, facts }
    }

    /// Handle one phone-state transition.
    ///
    /// Returns the recorded caller name, or `None` when the transition was
    /// ignored (not ringing, no number, or number not in contacts).
    pub fn on_phone_state(&self, state: &PhoneState) -> Result<Option<String>, ObserverError> {
        let number = match state {
            PhoneState::Ringing {
                number: Some(number),
            } if !number.trim().is_empty() => number,
            PhoneState::Ringing { .. } => {
                debug!("Ringing without a caller number");
                return Ok(None);
            }
            _ => return Ok(None),
        };

        let name = match self.contacts.display_name(number)? {
            Some(name) => name,
            None => {
                debug!("Incoming call from a number not in contacts");
                return Ok(None);
            }
        };

        let now = Utc::now().timestamp_millis();
        self.facts.put_all(&[
            (LAST_CALLER_NAME, name.clone()),
            (LAST_CALL_TIMESTAMP, now.to_string()),
        ])?;

        info!(caller = %name, "Recorded incoming caller");
        Ok(Some(name))
    }

    /// Like [`on_phone_state`](Self::on_phone_state) but never fails;
    /// errors are logged. Suitable for a platform broadcast callback.
    pub fn observe(&self, state: &PhoneState) {
        if let Err(e) = self.on_phone_state(state) {
            warn!(error = %e, "Call observer failed");
        }
    }
}
