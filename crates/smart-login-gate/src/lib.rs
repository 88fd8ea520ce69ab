//! Login Gate - condition store and aggregation controller.
//!
//! Five independent signal sources report pass/fail evidence
//! asynchronously. The [`AggregationController`] is their single consumer:
//! it applies every report to the [`ConditionStore`], forwards user
//! actions to the right source, and opens the gate on demand when every
//! condition currently passes.
//!
//! ## Invariants
//!
//! - **Single writer**: the store is mutated only by the controller, through
//!   `apply_status`.
//! - **Fresh evaluation**: the gate is never cached; each login attempt
//!   recomputes the conjunction.
//! - **No vacuous gate**: an empty store cannot be constructed.
//! - **Single use**: once authenticated, further login attempts are
//!   rejected and all sources are stopped.
//! - **Idempotent teardown**: pausing any number of times is safe.

pub mod config;
pub mod controller;
pub mod error;
pub mod mocks;
pub mod sink;
pub mod store;
pub mod traits;

pub use config::GateConfig;
pub use controller::{
    AggregationController, LoginOutcome, SessionCommand, SessionHandle, SessionState,
    SessionUpdate, UserAction,
};
pub use error::{GateError, GateResult};
pub use mocks::{ScriptStep, ScriptedSource};
pub use sink::{SignalSink, SourceOutput};
pub use store::{ConditionChange, ConditionStore};
pub use traits::SignalSource;
