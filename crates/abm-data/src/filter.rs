//! `DataFilter` — a processor that gates rows before handing them to
//! another processor.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{DataKey, DataProcessor, DataResult, DataRow};

/// How a filter's own interval is applied to regular rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum IntervalMode {
    /// Forward only rows whose tick is a multiple of the interval.
    #[default]
    Strict,
    /// Forward whatever arrives; the interval is advisory only.
    Loose,
}

/// Cloneable handle on the last row a filter delivered.
#[derive(Clone, Default)]
pub struct LatestRow(Arc<RwLock<Option<Arc<DataRow>>>>);

impl LatestRow {
    pub fn get(&self) -> Option<Arc<DataRow>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, row: &Arc<DataRow>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(row));
    }
}

/// Wraps one downstream processor.
///
/// A row is forwarded when it holds every required key and, for unforced
/// rows under a `Strict` interval, falls on a multiple of it.  Forced rows
/// (any state flag set) skip the interval gate only.
pub struct DataFilter {
    name:           String,
    required:       BTreeSet<DataKey>,
    interval:       Option<(u64, IntervalMode)>,
    latest:         LatestRow,
    consumer:       Box<dyn DataProcessor>,
}

impl DataFilter {
    pub fn new<P: DataProcessor + 'static>(consumer: P) -> Self {
        let name = format!("filter:{}", consumer.name());
        Self {
            name,
            required: BTreeSet::new(),
            interval: None,
            latest: LatestRow::default(),
            consumer: Box::new(consumer),
        }
    }

    /// Only forward rows that carry `key`.
    pub fn require(mut self, key: DataKey) -> Self {
        self.required.insert(key);
        self
    }

    pub fn interval(mut self, every: u64, mode: IntervalMode) -> Self {
        self.interval = Some((every.max(1), mode));
        self
    }

    /// Handle on the last delivered row, for consumers that attach late.
    pub fn latest(&self) -> LatestRow {
        self.latest.clone()
    }

    /// `true` when `row` would be forwarded.
    pub fn accepts(&self, row: &DataRow) -> bool {
        if !self.required.iter().all(|k| row.contains(k)) {
            return false;
        }
        if row.is_forced() {
            return true;
        }
        match self.interval {
            Some((every, IntervalMode::Strict)) => row.tick().is_multiple_of(every),
            Some((_, IntervalMode::Loose)) | None => true,
        }
    }
}

impl DataProcessor for DataFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_data_row(&mut self, row: &Arc<DataRow>) -> DataResult<()> {
        if !self.accepts(row) {
            return Ok(());
        }
        self.latest.set(row);
        self.consumer.process_data_row(row)
    }

    fn finalize_processing(&mut self) -> DataResult<()> {
        self.consumer.finalize_processing()
    }
}
