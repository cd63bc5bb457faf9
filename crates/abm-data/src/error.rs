//! Error types for abm-data.

use abm_command::CommandError;
use thiserror::Error;

use crate::CollectorKind;

#[derive(Debug, Error)]
pub enum DataError {
    /// The sampled quantity no longer exists in the model.
    #[error("data source has no {kind:?} named {name:?}")]
    SourceUnavailable { kind: CollectorKind, name: String },

    #[error("processor {name} failed: {reason}")]
    Processor { name: String, reason: String },

    #[error("consumer of {0} has disconnected")]
    Disconnected(String),

    #[error("background processor: {0}")]
    Command(#[from] CommandError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub fn processor(name: impl Into<String>, reason: impl Into<String>) -> Self {
        DataError::Processor { name: name.into(), reason: reason.into() }
    }
}

/// Alias for `Result<T, DataError>`.
pub type DataResult<T> = Result<T, DataError>;
