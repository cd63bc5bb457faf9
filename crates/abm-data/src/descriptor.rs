//! Collector descriptors and row keys.

use std::fmt;

use abm_core::Tick;
use serde::{Deserialize, Serialize};

/// Category of a sampleable quantity.  The category only tells the
/// [`DataSource`](crate::DataSource) which namespace to resolve `name` in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    /// A scalar model variable.
    Variable,
    /// A grid / data layer.
    DataLayer,
    /// The position set of one agent type.
    AgentPositions,
    /// The value found at one inspected point.
    PointInspection,
}

impl CollectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectorKind::Variable        => "variable",
            CollectorKind::DataLayer       => "data_layer",
            CollectorKind::AgentPositions  => "agent_positions",
            CollectorKind::PointInspection => "point_inspection",
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one value inside a [`DataRow`](crate::DataRow).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataKey {
    pub kind: CollectorKind,
    pub name: String,
}

impl DataKey {
    pub fn new(kind: CollectorKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(CollectorKind::Variable, name)
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Borrowed form of [`DataKey`] used for allocation-free row lookups.
///
/// Hashes exactly like `DataKey` (kind, then the name as `str`).
#[derive(Hash)]
pub(crate) struct KeyRef<'a> {
    pub kind: CollectorKind,
    pub name: &'a str,
}

impl indexmap::Equivalent<DataKey> for KeyRef<'_> {
    fn equivalent(&self, key: &DataKey) -> bool {
        self.kind == key.kind && self.name == key.name
    }
}

/// `(kind, name, interval)`: one sampleable quantity and its cadence.
///
/// Equality is by value, so the descriptor doubles as the key for
/// idempotent add/remove.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawDescriptor")]
pub struct DataCollectorDescriptor {
    pub kind:     CollectorKind,
    pub name:     String,
    /// Sample every `interval` ticks.  Values below 1 are stored as 1.
    pub interval: u64,
}

impl DataCollectorDescriptor {
    pub fn new(kind: CollectorKind, name: impl Into<String>, interval: u64) -> Self {
        Self { kind, name: name.into(), interval: interval.max(1) }
    }

    pub fn variable(name: impl Into<String>, interval: u64) -> Self {
        Self::new(CollectorKind::Variable, name, interval)
    }

    /// The row key this collector writes.
    pub fn key(&self) -> DataKey {
        DataKey::new(self.kind, self.name.clone())
    }

    /// `true` when a regular (unforced) sample is due at `tick`.
    #[inline]
    pub fn is_due(&self, tick: Tick) -> bool {
        tick.is_multiple_of(self.interval)
    }
}

/// Wire form of a descriptor; the interval is clamped on the way in.
#[derive(Deserialize)]
struct RawDescriptor {
    kind:     CollectorKind,
    name:     String,
    interval: u64,
}

impl From<RawDescriptor> for DataCollectorDescriptor {
    fn from(raw: RawDescriptor) -> Self {
        Self::new(raw.kind, raw.name, raw.interval)
    }
}

impl fmt::Display for DataCollectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.name, self.interval)
    }
}
