//! Error types for gdlgraph.
//!
//! Compile-time failures are fatal for the game being compiled. Runtime
//! failures (bad scripted moves, undecodable states) are recoverable by the
//! caller and never touch the shared symbol table.

use thiserror::Error;

use crate::parser::ParseError;

/// Every failure the library reports.
#[derive(Debug, Error)]
pub enum GdlError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Cannot compile rule: {0}")]
    Compile(String),

    #[error("Unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("Move '{text}' is not legal for player {player}")]
    InvalidMove { player: usize, text: String },

    #[error("Cannot decode state: {0}")]
    StateDecode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GdlError {
    pub(crate) fn compile(msg: impl Into<String>) -> Self {
        GdlError::Compile(msg.into())
    }

    /// True for errors a rollout driver should recover from by abandoning the rollout.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GdlError::InvalidMove { .. } | GdlError::StateDecode(_) | GdlError::UnknownSymbol(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GdlError>;
