//! Smart Login Types - the shared vocabulary of the login gate.
//!
//! A login session is gated behind five independent conditions. Each
//! condition is fed by its own asynchronous signal source; the aggregation
//! controller joins the resulting status events onto the condition store
//! by [`ConditionId`].
//!
//! ## Key Types
//!
//! - [`Condition`]: one gating requirement and its current status
//! - [`ConditionKind`]: who is allowed to advance a condition
//! - [`SignalEvent`]: a `(condition, status text, passed)` report
//! - [`FailureKind`]: why a condition is currently failing
//! - [`Notice`]: user-facing prompts that do not change condition state

pub mod condition;
pub mod signal;

pub use condition::{Condition, ConditionId, ConditionKind, PENDING_STATUS};
pub use signal::{FailureKind, Notice, RemediationTarget, SignalEvent};
