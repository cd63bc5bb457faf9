//! `abm-core` — foundational types for the `abm` simulation runtime.
//!
//! This crate is a dependency of every other `abm-*` crate.  It intentionally
//! has no `abm-*` dependencies and only a handful of external ones (`rand`,
//! `serde`, `thiserror`, `toml`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `Rank`                                          |
//! | [`time`]        | `Tick`, `Rational`, `SimulationTime`                       |
//! | [`rng`]         | `AgentRng` (per-agent), `SimRng` (run-level)               |
//! | [`value`]       | `DataValue` — the sampled-value sum type                   |
//! | [`config`]      | `RunConfig`, `ExecutionMode`, `HookErrorPolicy`            |
//! | [`error`]       | `CoreError`, `CoreResult`                                  |

pub mod config;
pub mod error;
pub mod ids;
pub mod rng;
pub mod time;
pub mod value;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{ExecutionMode, HookErrorPolicy, RunConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{AgentId, Rank};
pub use rng::{AgentRng, SimRng};
pub use time::{Rational, SimulationTime, Tick};
pub use value::DataValue;
