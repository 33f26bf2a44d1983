//! Error taxonomy shared by the key inventory and the tunnel supervisor
//!
//! Every failure carries a machine-checkable kind plus a human-readable
//! detail string. Layers convert their internal failures into these variants
//! before returning across a crate boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures returned by tunnel and key operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input; never retried
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown tunnel id or key name
    #[error("not found: {0}")]
    NotFound(String),

    /// Idempotency guard for key generation and uploads
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Idempotency guard for starting a live tunnel
    #[error("already running: {0}")]
    AlreadyRunning(String),

    /// External process could not start or died within the grace window
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// A stored password-auth tunnel cannot be restarted without a fresh
    /// password; only key-auth tunnels are restartable via start
    #[error("credentials required: {0}")]
    CredentialsRequired(String),

    /// Registry or key file could not be read or written
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Short machine-checkable kind, stable across detail-string changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::AlreadyRunning(_) => "already_running",
            Error::SpawnFailed(_) => "spawn_failed",
            Error::CredentialsRequired(_) => "credentials_required",
            Error::Persistence(_) => "persistence_error",
        }
    }
}
