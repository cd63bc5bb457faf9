//! Immutable data rows and their state header.

use std::fmt;

use abm_core::{DataValue, Rational, Tick};
use indexmap::IndexMap;

use crate::descriptor::KeyRef;
use crate::{CollectorKind, DataKey};

// ── StateFlags ────────────────────────────────────────────────────────────────

/// Independent state bits carried by every row.  Any combination is valid.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const NONE: StateFlags = StateFlags(0);
    pub const PAUSED: StateFlags = StateFlags(0x1);
    pub const INITIAL_STATE: StateFlags = StateFlags(0x2);
    pub const FINAL_STATE: StateFlags = StateFlags(0x4);
    pub const TERMINATED: StateFlags = StateFlags(0x8);

    const NAMES: [(StateFlags, &'static str); 4] = [
        (Self::PAUSED, "PAUSED"),
        (Self::INITIAL_STATE, "INITIAL_STATE"),
        (Self::FINAL_STATE, "FINAL_STATE"),
        (Self::TERMINATED, "TERMINATED"),
    ];

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        StateFlags(bits & 0xF)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` when every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: StateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: StateFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for StateFlags {
    type Output = StateFlags;
    #[inline]
    fn bitor(self, rhs: StateFlags) -> StateFlags {
        StateFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for StateFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: StateFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateFlags({self})")
    }
}

impl fmt::Display for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ── StateHeader ───────────────────────────────────────────────────────────────

/// Run state at the moment a row was sampled.
#[derive(Clone, Debug, PartialEq)]
pub struct StateHeader {
    pub tick:         Tick,
    pub model_time:   Rational,
    /// Unix milliseconds at sampling time.
    pub wall_time_ms: u64,
    /// Run seed in effect.
    pub seed:         u64,
    pub flags:        StateFlags,
}

// ── DataRow ───────────────────────────────────────────────────────────────────

/// One sampling occasion: a state header plus every value collected for it.
///
/// Built through [`DataRowBuilder`]; immutable afterwards and shared between
/// processors as `Arc<DataRow>`.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRow {
    header: StateHeader,
    values: IndexMap<DataKey, DataValue>,
}

impl DataRow {
    #[inline]
    pub fn header(&self) -> &StateHeader {
        &self.header
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.header.tick
    }

    #[inline]
    pub fn flags(&self) -> StateFlags {
        self.header.flags
    }

    /// `true` for initial, final and paused snapshots.
    #[inline]
    pub fn is_forced(&self) -> bool {
        !self.header.flags.is_empty()
    }

    pub fn get(&self, kind: CollectorKind, name: &str) -> Option<&DataValue> {
        self.values.get(&KeyRef { kind, name })
    }

    pub fn get_key(&self, key: &DataKey) -> Option<&DataValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &DataKey) -> bool {
        self.values.contains_key(key)
    }

    /// Numeric lookup of a `Variable` value.
    pub fn variable_f64(&self, name: &str) -> Option<f64> {
        self.get(CollectorKind::Variable, name).and_then(DataValue::as_f64)
    }

    pub fn variable_i64(&self, name: &str) -> Option<i64> {
        self.get(CollectorKind::Variable, name).and_then(DataValue::as_i64)
    }

    /// Values in collection order.
    pub fn values(&self) -> impl Iterator<Item = (&DataKey, &DataValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Mutable staging area filled by collectors, frozen by [`build`](Self::build).
#[derive(Debug)]
pub struct DataRowBuilder {
    header: StateHeader,
    values: IndexMap<DataKey, DataValue>,
}

impl DataRowBuilder {
    pub fn new(header: StateHeader) -> Self {
        Self { header, values: IndexMap::new() }
    }

    #[inline]
    pub fn header(&self) -> &StateHeader {
        &self.header
    }

    pub fn contains(&self, kind: CollectorKind, name: &str) -> bool {
        self.values.contains_key(&KeyRef { kind, name })
    }

    /// Store `value` under `key` unless the key is already present.
    /// Returns `false` (and keeps the existing value) on a duplicate.
    pub fn insert(&mut self, key: DataKey, value: DataValue) -> bool {
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value);
        true
    }

    pub fn build(self) -> DataRow {
        DataRow { header: self.header, values: self.values }
    }
}
