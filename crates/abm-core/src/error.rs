//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant where they surface configuration problems.

use thiserror::Error;

/// The top-level error type for `abm-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid time step {numer}/{denom}")]
    InvalidTimeStep { numer: u64, denom: u64 },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `abm-core`.
pub type CoreResult<T> = Result<T, CoreError>;
