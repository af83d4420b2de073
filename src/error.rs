//! Errors surfaced by registry and connection operations

use rtcbond_shared::{BondError, ConnectionKey, SourceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to create event source: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to start bond: {0}")]
    Bond(#[from] BondError),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection {key} is deleted")]
    Deleted { key: ConnectionKey },

    #[error("Connection {key} already has a bridge \"{label}\"")]
    DuplicateBridge { key: ConnectionKey, label: String },

    #[error("Event source error: {0}")]
    Source(#[from] SourceError),

    #[error("Bond error: {0}")]
    Bond(#[from] BondError),
}
