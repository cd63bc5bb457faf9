//! Parquet output backend (feature `parquet`).
//!
//! Creates two files per run in the configured output directory:
//! - `rows.parquet`, then `rows-1.parquet`, `rows-2.parquet`, …
//! - `values.parquet`, then `values-1.parquet`, …
//!
//! Records are buffered and written in batches of [`BATCH_ROWS`].

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Float64Builder, StringBuilder, UInt64Builder, UInt8Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::writer::OutputWriter;
use crate::{OutputResult, RowRecord, ValueRecord};

pub const BATCH_ROWS: usize = 1024;

fn row_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("row",          DataType::UInt64,  false),
        Field::new("tick",         DataType::UInt64,  false),
        Field::new("model_time",   DataType::Float64, false),
        Field::new("wall_time_ms", DataType::UInt64,  false),
        Field::new("seed",         DataType::UInt64,  false),
        Field::new("flags",        DataType::UInt8,   false),
    ]))
}

fn value_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("row",   DataType::UInt64, false),
        Field::new("kind",  DataType::Utf8,   false),
        Field::new("name",  DataType::Utf8,   false),
        Field::new("value", DataType::Utf8,   false),
    ]))
}

fn snappy_props() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// File name of `stem` for the `segment`-th run.
fn segment_file(stem: &str, segment: u32) -> String {
    if segment == 0 {
        format!("{stem}.parquet")
    } else {
        format!("{stem}-{segment}.parquet")
    }
}

/// The open file pair of one run.
struct Segment {
    rows:   ArrowWriter<File>,
    values: ArrowWriter<File>,
}

impl Segment {
    fn create(dir: &Path, segment: u32, rows: &Arc<Schema>, values: &Arc<Schema>) -> OutputResult<Self> {
        Ok(Self {
            rows: ArrowWriter::try_new(
                File::create(dir.join(segment_file("rows", segment)))?,
                Arc::clone(rows),
                Some(snappy_props()),
            )?,
            values: ArrowWriter::try_new(
                File::create(dir.join(segment_file("values", segment)))?,
                Arc::clone(values),
                Some(snappy_props()),
            )?,
        })
    }
}

/// Writes data rows to Parquet files, one pair per run.
///
/// `finish()` **must** be called to write the Parquet file footers; files
/// written without calling `finish()` cannot be opened by Parquet readers.
/// The first write after `finish()` opens the next pair of files.
pub struct ParquetWriter {
    dir:          PathBuf,
    segment:      u32,
    files:        Option<Segment>,
    row_schema:   Arc<Schema>,
    value_schema: Arc<Schema>,
    row_buf:      Vec<RowRecord>,
    value_buf:    Vec<ValueRecord>,
}

impl ParquetWriter {
    /// Create the first pair of Parquet files in `dir`.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let row_schema = row_schema();
        let value_schema = value_schema();
        let files = Segment::create(dir, 0, &row_schema, &value_schema)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            segment: 0,
            files: Some(files),
            row_schema,
            value_schema,
            row_buf: Vec::with_capacity(BATCH_ROWS),
            value_buf: Vec::with_capacity(BATCH_ROWS),
        })
    }

    /// Runs finished so far.
    pub fn segments_finished(&self) -> u32 {
        self.segment
    }

    /// The current file pair, opening the next one after a `finish`.
    fn files(&mut self) -> OutputResult<&mut Segment> {
        let files = match self.files.take() {
            Some(files) => files,
            None => Segment::create(&self.dir, self.segment, &self.row_schema, &self.value_schema)?,
        };
        Ok(self.files.insert(files))
    }

    fn flush_rows(&mut self) -> OutputResult<()> {
        if self.row_buf.is_empty() {
            return Ok(());
        }

        let mut seqs   = UInt64Builder::new();
        let mut ticks  = UInt64Builder::new();
        let mut times  = Float64Builder::new();
        let mut walls  = UInt64Builder::new();
        let mut seeds  = UInt64Builder::new();
        let mut flags  = UInt8Builder::new();

        for r in self.row_buf.drain(..) {
            seqs.append_value(r.row);
            ticks.append_value(r.tick);
            times.append_value(r.model_time);
            walls.append_value(r.wall_time_ms);
            seeds.append_value(r.seed);
            flags.append_value(r.flags.bits());
        }

        let batch = RecordBatch::try_new(
            Arc::clone(&self.row_schema),
            vec![
                Arc::new(seqs.finish()),
                Arc::new(ticks.finish()),
                Arc::new(times.finish()),
                Arc::new(walls.finish()),
                Arc::new(seeds.finish()),
                Arc::new(flags.finish()),
            ],
        )?;
        self.files()?.rows.write(&batch)?;
        Ok(())
    }

    fn flush_values(&mut self) -> OutputResult<()> {
        if self.value_buf.is_empty() {
            return Ok(());
        }

        let mut seqs   = UInt64Builder::new();
        let mut kinds  = StringBuilder::new();
        let mut names  = StringBuilder::new();
        let mut values = StringBuilder::new();

        for v in self.value_buf.drain(..) {
            seqs.append_value(v.row);
            kinds.append_value(v.kind);
            names.append_value(&v.name);
            values.append_value(&v.value);
        }

        let batch = RecordBatch::try_new(
            Arc::clone(&self.value_schema),
            vec![
                Arc::new(seqs.finish()),
                Arc::new(kinds.finish()),
                Arc::new(names.finish()),
                Arc::new(values.finish()),
            ],
        )?;
        self.files()?.values.write(&batch)?;
        Ok(())
    }
}

impl OutputWriter for ParquetWriter {
    fn write_row(&mut self, row: &RowRecord) -> OutputResult<()> {
        self.row_buf.push(*row);
        if self.row_buf.len() >= BATCH_ROWS {
            self.flush_rows()?;
        }
        Ok(())
    }

    fn write_values(&mut self, values: &[ValueRecord]) -> OutputResult<()> {
        self.value_buf.extend_from_slice(values);
        if self.value_buf.len() >= BATCH_ROWS {
            self.flush_values()?;
        }
        Ok(())
    }

    /// Close the current file pair.  A no-op when nothing was written since
    /// the last `finish`.
    fn finish(&mut self) -> OutputResult<()> {
        self.flush_rows()?;
        self.flush_values()?;
        if let Some(files) = self.files.take() {
            files.rows.close()?;
            files.values.close()?;
            self.segment += 1;
        }
        Ok(())
    }
}
