//! Error types for abm-output.

use abm_data::DataError;
use thiserror::Error;

/// Errors that can occur when writing rows to disk.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// A compound value could not be rendered as JSON.
    #[error("value encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "parquet")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl OutputError {
    /// Wrap for the data pipeline, which only knows [`DataError`].
    pub(crate) fn into_data(self, processor: &str) -> DataError {
        match self {
            OutputError::Io(e) => DataError::Io(e),
            other => DataError::processor(processor, other.to_string()),
        }
    }
}

/// Alias for `Result<T, OutputError>`.
pub type OutputResult<T> = Result<T, OutputError>;
