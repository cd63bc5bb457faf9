//! The `OutputWriter` trait implemented by all backend writers.

use crate::{OutputResult, RowRecord, ValueRecord};

/// Trait implemented by the CSV, SQLite and Parquet writers.
pub trait OutputWriter: Send {
    /// Write one row header.
    fn write_row(&mut self, row: &RowRecord) -> OutputResult<()>;

    /// Write the values belonging to one row.
    fn write_values(&mut self, values: &[ValueRecord]) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent.
    fn finish(&mut self) -> OutputResult<()>;
}
