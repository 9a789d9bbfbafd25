//! Runner error types

use scenario_core::CoreError;
use scenario_world::WorldError;
use thiserror::Error;

pub type RunnerResult<T> = Result<T, RunnerError>;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// Malformed scenario file, reported with the file it came from
    #[error("error parsing {path}: {message}")]
    Parse { path: String, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// One or more expectations did not hold
    #[error("{0}")]
    CheckFailure(String),

    #[error("IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    World(#[from] WorldError),
}

impl RunnerError {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        RunnerError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for expectation mismatches, as opposed to broken scenarios
    pub fn is_check_failure(&self) -> bool {
        matches!(self, RunnerError::CheckFailure(_))
    }
}
