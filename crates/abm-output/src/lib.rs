//! `abm-output` — file sinks for the abm data pipeline.
//!
//! Three backends are provided behind Cargo features:
//!
//! | Feature   | Backend     | Files created                          |
//! |-----------|-------------|----------------------------------------|
//! | *(none)*  | CSV         | `rows.csv`, `values.csv`               |
//! | `sqlite`  | SQLite      | `output.db`                            |
//! | `parquet` | Parquet     | `rows.parquet`, `values.parquet`       |
//!
//! All backends implement [`OutputWriter`] and are driven by
//! [`OutputProcessor`], which implements `abm_data::DataProcessor`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use abm_output::{OutputConfig, OutputProcessor};
//!
//! let sink = OutputProcessor::csv(&OutputConfig::new("./output"))?;
//! let engine = EngineBuilder::new(model, config).processor(sink).build()?;
//! ```

pub mod csv;
pub mod error;
pub mod row;
pub mod sink;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "parquet")]
pub mod parquet;


pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use row::{value_records, RowRecord, ValueRecord};
pub use sink::{OutputConfig, OutputProcessor};
pub use writer::OutputWriter;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;

#[cfg(feature = "parquet")]
pub use parquet::ParquetWriter;
