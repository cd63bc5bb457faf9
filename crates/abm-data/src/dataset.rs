//! `DataSet` — the registry of collectors and processors driven once per
//! emitted row.

use std::fmt;
use std::sync::Arc;

use abm_core::SimulationTime;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    DataCollector, DataCollectorDescriptor, DataError, DataProcessor, DataResult, DataRow,
    DataRowBuilder, DataSource, SourceCollector, StateHeader,
};

/// Handle returned by [`DataSet::add_processor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(pub u64);

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessorId({})", self.0)
    }
}

struct CollectorSlot {
    collector: Box<dyn DataCollector>,
    /// Cleared by the circuit breaker; an inactive slot is skipped until the
    /// end of the run.
    active:    bool,
}

struct ProcessorSlot {
    id:        ProcessorId,
    processor: Box<dyn DataProcessor>,
}

/// Collectors in insertion order plus the processors every row goes to.
#[derive(Default)]
pub struct DataSet {
    collectors:     IndexMap<DataCollectorDescriptor, CollectorSlot>,
    processors:     Vec<ProcessorSlot>,
    next_processor: u64,
    rows_emitted:   u64,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Collectors ────────────────────────────────────────────────────────

    /// Register a [`SourceCollector`] for `descriptor`.
    ///
    /// Idempotent: returns `false` when an active collector for an equal
    /// descriptor already exists.  A collector switched off by the circuit
    /// breaker is replaced by a fresh one.
    pub fn add_collector(&mut self, descriptor: DataCollectorDescriptor) -> bool {
        let collector = SourceCollector::new(descriptor);
        self.add_custom_collector(Box::new(collector))
    }

    /// Register a user-supplied collector under its own descriptor.
    pub fn add_custom_collector(&mut self, collector: Box<dyn DataCollector>) -> bool {
        let descriptor = collector.descriptor().clone();
        if let Some(slot) = self.collectors.get_mut(&descriptor) {
            if slot.active {
                return false;
            }
            *slot = CollectorSlot { collector, active: true };
            return true;
        }
        debug!(collector = %descriptor, "collector added");
        self.collectors.insert(descriptor, CollectorSlot { collector, active: true });
        true
    }

    /// Returns `false` when no collector for `descriptor` was registered.
    pub fn remove_collector(&mut self, descriptor: &DataCollectorDescriptor) -> bool {
        self.collectors.shift_remove(descriptor).is_some()
    }

    pub fn is_active(&self, descriptor: &DataCollectorDescriptor) -> bool {
        self.collectors.get(descriptor).is_some_and(|s| s.active)
    }

    /// Descriptors of the collectors that are currently sampling.
    pub fn active_collectors(&self) -> impl Iterator<Item = &DataCollectorDescriptor> {
        self.collectors.iter().filter(|(_, s)| s.active).map(|(d, _)| d)
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    // ── Processors ────────────────────────────────────────────────────────

    pub fn add_processor<P: DataProcessor + 'static>(&mut self, processor: P) -> ProcessorId {
        self.add_boxed_processor(Box::new(processor))
    }

    pub fn add_boxed_processor(&mut self, processor: Box<dyn DataProcessor>) -> ProcessorId {
        let id = ProcessorId(self.next_processor);
        self.next_processor += 1;
        debug!(processor = processor.name(), %id, "processor bound");
        self.processors.push(ProcessorSlot { id, processor });
        id
    }

    /// Unbind a processor.  It receives no further rows and is *not*
    /// finalized; the caller owns it again.
    pub fn remove_processor(&mut self, id: ProcessorId) -> Option<Box<dyn DataProcessor>> {
        let pos = self.processors.iter().position(|p| p.id == id)?;
        Some(self.processors.remove(pos).processor)
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    // ── Per-row work ──────────────────────────────────────────────────────

    /// Run every active collector against `source` and freeze the result.
    ///
    /// A row with any state flag set is forced: every collector samples
    /// regardless of its interval.
    pub fn produce_row(
        &mut self,
        source: &dyn DataSource,
        time:   &SimulationTime,
        header: StateHeader,
    ) -> DataRow {
        let force = !header.flags.is_empty();
        let mut row = DataRowBuilder::new(header);
        for (descriptor, slot) in self.collectors.iter_mut() {
            if !slot.active {
                continue;
            }
            match slot.collector.collect(source, &mut row, time, force) {
                Ok(_) => {}
                Err(e @ DataError::SourceUnavailable { .. }) => {
                    warn!(collector = %descriptor, tick = time.tick().0, error = %e,
                          "collector disabled for the rest of the run");
                    slot.active = false;
                }
                Err(e) => {
                    warn!(collector = %descriptor, tick = time.tick().0, error = %e,
                          "collector failed");
                }
            }
        }
        row.build()
    }

    /// Hand `row` to every bound processor.  Delivery errors are logged and
    /// do not reach the caller.  Returns the number of clean deliveries.
    pub fn dispatch(&mut self, row: &Arc<DataRow>) -> usize {
        let mut delivered = 0;
        for slot in &mut self.processors {
            match slot.processor.process_data_row(row) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(processor = slot.processor.name(), tick = row.tick().0,
                                error = %e, "row delivery failed"),
            }
        }
        delivered
    }

    /// [`produce_row`](Self::produce_row) followed by
    /// [`dispatch`](Self::dispatch).
    pub fn emit(
        &mut self,
        source: &dyn DataSource,
        time:   &SimulationTime,
        header: StateHeader,
    ) -> Arc<DataRow> {
        let row = Arc::new(self.produce_row(source, time, header));
        self.dispatch(&row);
        self.rows_emitted += 1;
        row
    }

    /// Rows emitted since construction.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// End-of-run teardown: reset and re-arm every collector, then finalize
    /// every processor.  All processors are finalized even when one fails;
    /// the first error is returned.
    pub fn finish(&mut self) -> DataResult<()> {
        for slot in self.collectors.values_mut() {
            slot.collector.reset();
            slot.active = true;
        }
        let mut first_err = None;
        for slot in &mut self.processors {
            if let Err(e) = slot.processor.finalize_processing() {
                warn!(processor = slot.processor.name(), error = %e, "finalize failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
