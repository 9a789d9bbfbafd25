//! Error types for the core crate

use thiserror::Error;

/// Errors raised while parsing scenario JSON or byte expressions
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed ordered JSON input
    #[error("JSON parse error at byte {offset}: {message}")]
    Json { offset: usize, message: String },

    /// Malformed byte expression
    #[error("{0}")]
    Expression(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

impl CoreError {
    pub(crate) fn json(offset: usize, message: impl Into<String>) -> Self {
        CoreError::Json {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn expr(message: impl Into<String>) -> Self {
        CoreError::Expression(message.into())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
