use smart_login_types::ConditionId;
use thiserror::Error;

/// Errors from the condition store and aggregation controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("unknown condition id: {0}")]
    UnknownCondition(ConditionId),

    #[error("duplicate condition id: {0}")]
    DuplicateCondition(ConditionId),

    #[error("condition store must hold at least one condition")]
    EmptyStore,

    #[error("session already authenticated")]
    AlreadyAuthenticated,

    #[error("session is paused")]
    SessionPaused,

    #[error("session closed")]
    SessionClosed,

    #[error("{condition} does not accept {action}")]
    ActionNotAccepted {
        condition: ConditionId,
        action: &'static str,
    },
}

pub type GateResult<T> = Result<T, GateError>;
