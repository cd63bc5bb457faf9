//! Collectors — the producers of row values.

use abm_core::SimulationTime;

use crate::{DataCollectorDescriptor, DataError, DataResult, DataRowBuilder, DataSource};

/// Samples exactly one named quantity into a row.
///
/// Implementations must be idempotent per row: if the row already holds
/// their key, `collect` does nothing.
pub trait DataCollector: Send {
    fn descriptor(&self) -> &DataCollectorDescriptor;

    /// Sample into `row` when the tick is on this collector's interval or
    /// `force` is set.  Returns whether a value was written.
    ///
    /// Fails with [`DataError::SourceUnavailable`] when the quantity no
    /// longer exists.
    fn collect(
        &mut self,
        source: &dyn DataSource,
        row:    &mut DataRowBuilder,
        time:   &SimulationTime,
        force:  bool,
    ) -> DataResult<bool>;

    /// Forget per-run state.  Called once at the end of every run.
    fn reset(&mut self) {}
}

/// The standard collector: resolves its descriptor against a [`DataSource`].
#[derive(Debug, Clone)]
pub struct SourceCollector {
    descriptor: DataCollectorDescriptor,
    samples:    u64,
}

impl SourceCollector {
    pub fn new(descriptor: DataCollectorDescriptor) -> Self {
        Self { descriptor, samples: 0 }
    }

    /// Values written since the last reset.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl DataCollector for SourceCollector {
    fn descriptor(&self) -> &DataCollectorDescriptor {
        &self.descriptor
    }

    fn collect(
        &mut self,
        source: &dyn DataSource,
        row:    &mut DataRowBuilder,
        time:   &SimulationTime,
        force:  bool,
    ) -> DataResult<bool> {
        let d = &self.descriptor;
        if !force && !d.is_due(time.tick()) {
            return Ok(false);
        }
        if row.contains(d.kind, &d.name) {
            return Ok(false);
        }
        let value = source.sample(d.kind, &d.name).ok_or_else(|| DataError::SourceUnavailable {
            kind: d.kind,
            name: d.name.clone(),
        })?;
        row.insert(d.key(), value);
        self.samples += 1;
        Ok(true)
    }

    fn reset(&mut self) {
        self.samples = 0;
    }
}
