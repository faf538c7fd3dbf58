//! Error types shared across the daemon

use thiserror::Error;

use crate::state::{TimerCommand, TimerState};

/// Library-wide error type
#[derive(Error, Debug)]
pub enum StudyError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store's connection lock was poisoned by a panicking writer
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A row looked up by id does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Caller supplied an invalid value
    #[error("Invalid value for '{field}': {message}")]
    Validation { field: &'static str, message: String },

    /// A timer command that the current state does not allow
    #[error("Cannot {command} the timer while it is {state}")]
    InvalidTransition {
        command: TimerCommand,
        state: TimerState,
    },

    /// The background session runner has shut down
    #[error("Session runner is not running")]
    RunnerUnavailable,
}

impl StudyError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Result alias for [`StudyError`]
pub type Result<T, E = StudyError> = std::result::Result<T, E>;
