//! Errors reported by the collaborators a connection drives

use thiserror::Error;

/// Failure closing the underlying signaling/media transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport already closed")]
    Closed,

    #[error("Transport close failed: {reason}")]
    CloseFailed { reason: String },
}

/// Failure of an event source or its factory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Event source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure of a liveness bond
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BondError {
    #[error("No async runtime available to drive bond")]
    NoRuntime,

    #[error("Bond {0} already started")]
    AlreadyStarted(String),

    #[error("Bond {0} heartbeat period must be non-zero")]
    ZeroPeriod(String),

    #[error("Bond shutdown failed: {reason}")]
    ShutdownFailed { reason: String },
}
