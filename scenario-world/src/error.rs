//! Ledger error types

use scenario_core::{Address, CoreError};
use thiserror::Error;

/// Mock ledger error type
#[derive(Error, Debug)]
pub enum WorldError {
    /// Rejected input such as a bad address or code without owner
    #[error("{0}")]
    Validation(String),

    /// Transaction could not be carried out
    #[error("{0}")]
    Execution(String),

    /// A ledger invariant was broken by a host outcome
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("unknown transaction type: {0}")]
    UnknownTxType(String),

    /// ESDT storage could not be encoded or decoded
    #[error("ESDT codec error: {0}")]
    Codec(String),

    #[error("account not found: {0}")]
    AccountNotFound(Address),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<bincode::error::EncodeError> for WorldError {
    fn from(err: bincode::error::EncodeError) -> Self {
        WorldError::Codec(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for WorldError {
    fn from(err: bincode::error::DecodeError) -> Self {
        WorldError::Codec(err.to_string())
    }
}

/// Result type for ledger operations
pub type WorldResult<T> = Result<T, WorldError>;
