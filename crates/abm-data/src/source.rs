//! The registry collectors sample from.

use abm_core::DataValue;

use crate::CollectorKind;

/// Opaque name → value lookup, implemented by the model layer.
///
/// Returning `None` means the quantity does not exist (any more); the
/// collector asking for it is switched off for the rest of the run.
pub trait DataSource {
    fn sample(&self, kind: CollectorKind, name: &str) -> Option<DataValue>;
}

/// Closures make handy ad-hoc sources in tests and tools.
impl<F> DataSource for F
where
    F: Fn(CollectorKind, &str) -> Option<DataValue>,
{
    fn sample(&self, kind: CollectorKind, name: &str) -> Option<DataValue> {
        self(kind, name)
    }
}
