//! Flat record types written by output backends.
//!
//! Every [`DataRow`] becomes one [`RowRecord`] (the state header) plus one
//! [`ValueRecord`] per collected value, joined on the `row` sequence number.

use abm_core::DataValue;
use abm_data::{DataRow, StateFlags};

use crate::OutputResult;

/// The state header of one delivered row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowRecord {
    /// Position of the row in this sink's output, from 0.
    pub row:          u64,
    pub tick:         u64,
    /// Model time as a float; exact for integer steps.
    pub model_time:   f64,
    pub wall_time_ms: u64,
    pub seed:         u64,
    pub flags:        StateFlags,
}

/// One collected value.  Scalars are written as text, compound values
/// (grids, point sets) as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    pub row:   u64,
    pub kind:  &'static str,
    pub name:  String,
    pub value: String,
}

impl RowRecord {
    pub fn from_row(seq: u64, row: &DataRow) -> Self {
        let header = row.header();
        Self {
            row:          seq,
            tick:         header.tick.0,
            model_time:   header.model_time.to_f64(),
            wall_time_ms: header.wall_time_ms,
            seed:         header.seed,
            flags:        header.flags,
        }
    }
}

/// Flatten every value of `row`, in collection order.
pub fn value_records(seq: u64, row: &DataRow) -> OutputResult<Vec<ValueRecord>> {
    row.values()
        .map(|(key, value)| {
            Ok(ValueRecord {
                row:   seq,
                kind:  key.kind.as_str(),
                name:  key.name.clone(),
                value: render(value)?,
            })
        })
        .collect()
}

fn render(value: &DataValue) -> OutputResult<String> {
    if value.is_scalar() {
        Ok(value.to_string())
    } else {
        Ok(serde_json::to_string(value)?)
    }
}
