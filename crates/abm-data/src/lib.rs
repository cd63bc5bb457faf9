//! `abm-data` — the data collection, filtering and delivery pipeline.
//!
//! ```text
//!  DataSource ──► collectors ──► DataRow ──► processors
//!  (model)        (producers)    (snapshot)   (filters wrap sinks)
//! ```
//!
//! # Crate layout
//!
//! | Module          | Contents                                                    |
//! |-----------------|-------------------------------------------------------------|
//! | [`descriptor`]  | `CollectorKind`, `DataKey`, `DataCollectorDescriptor`       |
//! | [`row`]         | `StateFlags`, `StateHeader`, `DataRow`, `DataRowBuilder`    |
//! | [`source`]      | `DataSource` — the opaque name → value registry             |
//! | [`collector`]   | `DataCollector` trait, `SourceCollector`                    |
//! | [`filter`]      | `DataFilter`, `IntervalMode`, `LatestRow`                   |
//! | [`processor`]   | `DataProcessor` trait, memory/channel/background sinks      |
//! | [`dataset`]     | `DataSet` — collector + processor registry driven per tick  |
//! | [`error`]       | `DataError`, `DataResult<T>`                                |
//!
//! # Failure containment
//!
//! A collector whose quantity disappears is switched off for the rest of the
//! run.  A processor that fails on one row is logged and keeps receiving
//! rows.  Only `finalize_processing` errors leave the pipeline.

pub mod collector;
pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod processor;
pub mod row;
pub mod source;

#[cfg(test)]
mod tests;

pub use collector::{DataCollector, SourceCollector};
pub use dataset::{DataSet, ProcessorId};
pub use descriptor::{CollectorKind, DataCollectorDescriptor, DataKey};
pub use error::{DataError, DataResult};
pub use filter::{DataFilter, IntervalMode, LatestRow};
pub use processor::{
    BackgroundProcessor, ChannelProcessor, DataProcessor, MemoryHandle, MemoryProcessor,
};
pub use row::{DataRow, DataRowBuilder, StateFlags, StateHeader};
pub use source::DataSource;
