use thiserror::Error;

use crate::diff::Operation;

/// Failure reported by a host callback (surface or observer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Problems reported through the board's error side channel.
///
/// None of these stop the board; the offending input is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("invalid move {0:?}")]
    InvalidMove(String),
    #[error("invalid orientation {0:?}")]
    InvalidOrientation(String),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("invalid configured position {value:?}: {reason}")]
    InvalidConfigPosition { value: String, reason: String },
    #[error("{hook} handler failed: {source}")]
    Observer {
        hook: &'static str,
        #[source]
        source: HostError,
    },
    #[error("effect {operation:?} failed to start: {source}")]
    Effect {
        operation: Operation,
        #[source]
        source: HostError,
    },
}

impl BoardError {
    /// Stable numeric code, shown to hosts next to the message.
    pub fn code(&self) -> u16 {
        match self {
            BoardError::InvalidMove(_) => 2826,
            BoardError::InvalidOrientation(_) => 5482,
            BoardError::InvalidPosition(_) => 6482,
            BoardError::InvalidConfigPosition { .. } => 7263,
            BoardError::Observer { .. } => 8001,
            BoardError::Effect { .. } => 8002,
        }
    }
}
