use std::path::PathBuf;

use thiserror::Error;

use crate::platform::SensorKind;

/// Errors raised by platform collaborators.
///
/// Sources never propagate these: each one is caught at the source boundary
/// and reported as a `ServiceUnavailable` condition status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("sensor not present: {0:?}")]
    SensorMissing(SensorKind),

    #[error("proximity radio not supported")]
    RadioUnsupported,

    #[error("platform query failed: {0}")]
    QueryFailed(String),

    #[error("service not bound: {0}")]
    ServiceUnbound(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors from the persisted fact store.
#[derive(Error, Debug)]
pub enum FactStoreError {
    #[error("failed to read fact store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write fact store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fact store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the incoming-call observer.
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("contact lookup failed: {0}")]
    Lookup(#[from] PlatformError),

    #[error("failed to record caller: {0}")]
    Record(#[from] FactStoreError),
}
