use std::io;
use thiserror::Error;

/// Failures of registry access and lifecycle operations. Idempotent no-ops
/// (already running, not running) are not errors but outcome variants.
#[derive(Error, Debug)]
pub enum Error {
    #[error("instance '{0}' has no record")]
    NotFound(String),

    #[error("invalid instance record: {0}")]
    InvalidRecord(String),

    #[error("session backend error: {0}")]
    Session(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("port {0} is already assigned to another instance")]
    PortConflict(u16),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
