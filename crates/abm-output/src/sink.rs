//! `OutputProcessor<W>` — bridges the data pipeline to an `OutputWriter`.

use std::path::PathBuf;
use std::sync::Arc;

use abm_data::{DataProcessor, DataResult, DataRow, StateFlags};
use tracing::{debug, info};

use crate::row::{value_records, RowRecord};
use crate::writer::OutputWriter;
use crate::{CsvWriter, OutputResult};

/// Where and what a file sink writes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    /// Directory the backend creates its files in.  Created if missing.
    pub dir:            PathBuf,
    /// Also write rows emitted while paused.
    pub include_paused: bool,
}

impl OutputConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), include_paused: false }
    }

    pub fn include_paused(mut self, include: bool) -> Self {
        self.include_paused = include;
        self
    }
}

/// A [`DataProcessor`] that writes every delivered row to any
/// [`OutputWriter`] backend (CSV, SQLite, Parquet, …).
///
/// Rows flagged `PAUSED` are skipped unless the sink was built with
/// `include_paused`.
pub struct OutputProcessor<W: OutputWriter> {
    name:           String,
    writer:         W,
    include_paused: bool,
    next_row:       u64,
}

impl<W: OutputWriter> OutputProcessor<W> {
    pub fn new(name: impl Into<String>, writer: W, include_paused: bool) -> Self {
        Self { name: name.into(), writer, include_paused, next_row: 0 }
    }

    /// Rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.next_row
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn write(&mut self, row: &DataRow) -> OutputResult<()> {
        let seq = self.next_row;
        self.writer.write_row(&RowRecord::from_row(seq, row))?;
        let values = value_records(seq, row)?;
        if !values.is_empty() {
            self.writer.write_values(&values)?;
        }
        self.next_row += 1;
        Ok(())
    }
}

impl OutputProcessor<CsvWriter> {
    /// CSV sink writing into `config.dir`.
    pub fn csv(config: &OutputConfig) -> OutputResult<Self> {
        std::fs::create_dir_all(&config.dir)?;
        let writer = CsvWriter::new(&config.dir)?;
        Ok(Self::new("csv", writer, config.include_paused))
    }
}

#[cfg(feature = "sqlite")]
impl OutputProcessor<crate::SqliteWriter> {
    /// SQLite sink writing `output.db` into `config.dir`.
    pub fn sqlite(config: &OutputConfig) -> OutputResult<Self> {
        std::fs::create_dir_all(&config.dir)?;
        let writer = crate::SqliteWriter::new(&config.dir)?;
        Ok(Self::new("sqlite", writer, config.include_paused))
    }
}

#[cfg(feature = "parquet")]
impl OutputProcessor<crate::ParquetWriter> {
    /// Parquet sink writing into `config.dir`.
    pub fn parquet(config: &OutputConfig) -> OutputResult<Self> {
        std::fs::create_dir_all(&config.dir)?;
        let writer = crate::ParquetWriter::new(&config.dir)?;
        Ok(Self::new("parquet", writer, config.include_paused))
    }
}

impl<W: OutputWriter> DataProcessor for OutputProcessor<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_data_row(&mut self, row: &Arc<DataRow>) -> DataResult<()> {
        if row.flags().contains(StateFlags::PAUSED) && !self.include_paused {
            debug!(sink = %self.name, tick = row.tick().0, "paused row skipped");
            return Ok(());
        }
        let name = self.name.clone();
        self.write(row).map_err(|e| e.into_data(&name))
    }

    fn finalize_processing(&mut self) -> DataResult<()> {
        info!(sink = %self.name, rows = self.next_row, "output finished");
        let name = self.name.clone();
        self.writer.finish().map_err(|e| e.into_data(&name))
    }
}
