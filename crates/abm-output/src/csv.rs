//! CSV output backend.
//!
//! Creates two files in the configured output directory:
//! - `rows.csv`: one line per row header
//! - `values.csv`: one line per collected value

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{OutputResult, RowRecord, ValueRecord};

/// Writes data rows to two CSV files.
pub struct CsvWriter {
    rows:   Writer<File>,
    values: Writer<File>,
}

impl CsvWriter {
    /// Open (or create) the two CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut rows = Writer::from_path(dir.join("rows.csv"))?;
        rows.write_record(["row", "tick", "model_time", "wall_time_ms", "seed", "flags"])?;

        let mut values = Writer::from_path(dir.join("values.csv"))?;
        values.write_record(["row", "kind", "name", "value"])?;

        Ok(Self { rows, values })
    }
}

impl OutputWriter for CsvWriter {
    fn write_row(&mut self, row: &RowRecord) -> OutputResult<()> {
        self.rows.write_record(&[
            row.row.to_string(),
            row.tick.to_string(),
            row.model_time.to_string(),
            row.wall_time_ms.to_string(),
            row.seed.to_string(),
            row.flags.to_string(),
        ])?;
        Ok(())
    }

    fn write_values(&mut self, values: &[ValueRecord]) -> OutputResult<()> {
        for v in values {
            self.values.write_record([v.row.to_string().as_str(), v.kind, &v.name, &v.value])?;
        }
        Ok(())
    }

    /// Flushes both files.  The writer stays usable, so a sink shared by
    /// several runs keeps appending.
    fn finish(&mut self) -> OutputResult<()> {
        self.rows.flush()?;
        self.values.flush()?;
        Ok(())
    }
}
