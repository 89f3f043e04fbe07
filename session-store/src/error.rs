//! Error types for the session store

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Session errors
#[derive(Error, Debug)]
pub enum Error {
    /// Session does not exist (or has expired)
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No player with that name
    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    /// Player index out of range
    #[error("Invalid player index: {0}")]
    InvalidPlayerIndex(usize),

    /// Name already taken in this session
    #[error("A player named {0:?} already exists")]
    DuplicatePlayer(String),

    /// Record failed validation
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Settlement requested while some players are still pending
    #[error("Not all players have submitted their final amounts")]
    NotAllSubmitted,

    /// The first player (the host) has no payment handle
    #[error("Host must have a payment handle")]
    HostHandleMissing,

    /// Declared margin of error differs from the pot imbalance
    #[error("Margin of error {margin_of_error} does not match pot imbalance {total_net}")]
    MarginMismatch {
        /// Pot imbalance before distribution
        total_net: Decimal,
        /// Declared margin
        margin_of_error: Decimal,
    },

    /// No verified transaction set is stored for the session
    #[error("Session has not been settled")]
    NotSettled,

    /// Session already completed
    #[error("Session already settled")]
    AlreadySettled,

    /// Settlement engine error
    #[error("Settlement error: {0}")]
    Settlement(#[from] potsplit_settlement::Error),

    /// Export sink failure
    #[error("Export error: {0}")]
    Export(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
