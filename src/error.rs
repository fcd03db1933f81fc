//! Typed error taxonomy for the command interface (see spec §7).
//!
//! Every fallible operation on the public command surface returns
//! `Result<T, CoreError>`. Internal plumbing that never crosses the command
//! boundary (demo-binary wiring, config loading) is free to use
//! `color_eyre::Result` instead, the way the teacher's `main.rs` does.

use thiserror::Error;

use crate::model::PlaylistId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("playlist or track not found: {0}")]
    NotFound(String),

    #[error("track index out of range")]
    OutOfRange,

    #[error("an association session is already listening for playlist {0:?}")]
    AlreadyActive(PlaylistId),

    #[error("nfc uid already bound to playlist {0:?}")]
    Conflict(PlaylistId),

    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("backend not started")]
    BackendNotStarted,

    #[error("repository error: {0}")]
    RepositoryError(String),

    #[error("operation timed out")]
    Timeout,

    #[error("queue overflow")]
    QueueOverflow,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The machine-readable `kind` carried on `player_error`/`nfc_error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::OutOfRange => "out_of_range",
            CoreError::AlreadyActive(_) => "already_active",
            CoreError::Conflict(_) => "conflict",
            CoreError::HardwareUnavailable(_) => "hardware_unavailable",
            CoreError::BackendNotStarted => "backend_not_started",
            CoreError::RepositoryError(_) => "repository_error",
            CoreError::Timeout => "timeout",
            CoreError::QueueOverflow => "queue_overflow",
            CoreError::Internal(_) => "internal_error",
        }
    }

    /// Human-readable message, as carried on `player_error`/`nfc_error` events.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
