//! Error types for the settlement engine

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Payment handle failed to parse
    #[error("Invalid payment handle: {0}")]
    InvalidHandle(String),

    /// Transaction record breaks the one-known-side rule
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Generated transactions failed independent validation
    #[error("Settlement inconsistent: {0}")]
    Inconsistent(#[from] crate::validator::ValidationFailure),

    /// Payment link could not be built
    #[error("Payment link error: {0}")]
    Link(String),
}
