//! `DataValue` — one sampled quantity as it travels through the data pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A sampled value.  Scalars cover model variables; `Grid` covers data layers;
/// `Points` covers agent position sets and point inspections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Grid {
        width:  u32,
        height: u32,
        cells:  Vec<f64>,
    },
    Points(Vec<[f64; 2]>),
}

impl DataValue {
    /// Numeric view of a scalar value; `None` for text and compound values.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DataValue::Bool(b)  => Some(if b { 1.0 } else { 0.0 }),
            DataValue::Int(i)   => Some(i as f64),
            DataValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            DataValue::Int(i)  => Some(i),
            DataValue::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true` for `Bool`, `Int`, `Float` and `Text`.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataValue::Grid { .. } | DataValue::Points(_))
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Bool(b)  => write!(f, "{b}"),
            DataValue::Int(i)   => write!(f, "{i}"),
            DataValue::Float(x) => write!(f, "{x}"),
            DataValue::Text(s)  => f.write_str(s),
            DataValue::Grid { width, height, .. } => write!(f, "grid[{width}x{height}]"),
            DataValue::Points(p) => write!(f, "points[{}]", p.len()),
        }
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Bool(v)
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int(v)
    }
}

impl From<usize> for DataValue {
    fn from(v: usize) -> Self {
        DataValue::Int(v as i64)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Text(v.to_owned())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::Text(v)
    }
}
