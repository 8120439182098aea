//! Error Types
//!
//! A single error enum shared by the stores, the router and the reply controller.

use thiserror::Error;

/// Errors raised while handling a chat command
#[derive(Debug, Error)]
pub enum BotError {
    /// A required argument was missing or blank
    #[error("{0}")]
    Validation(String),

    /// The storage backend failed or could not be reached
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The command name is not part of the command set
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    /// No acknowledgment path could deliver the response
    #[error("reply channel exhausted: {0}")]
    ReplyChannelExhausted(String),

    /// A reply operation was attempted from a state that does not allow it
    #[error("illegal reply transition: cannot {op} while {state}")]
    IllegalTransition { op: &'static str, state: String },

    /// Missing or invalid process configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The chat platform rejected an API call
    #[error("platform error: {0}")]
    Platform(String),
}

impl BotError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

pub type BotResult<T> = std::result::Result<T, BotError>;
