//! `abm-agent` — agent storage and per-tick visitation.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                  |
//! |------------------|-----------------------------------------------------------|
//! | [`agent`]        | `Agent` trait — the per-agent extension point             |
//! | [`population`]   | `Population<A>` — slot arena, free list, id index         |
//! | [`context`]      | `StepContext` — what an agent may do while stepping       |
//! | [`scheduler`]    | `Scheduler`, `TickVisit` — Serial / Concurrent / Parallel |
//! | [`error`]        | `AgentError`, `SchedulerError`                            |
//!
//! # Tick contract
//!
//! Every agent alive when a pass starts is stepped at most once in that
//! pass, and exactly once unless it is killed before its turn.  Deaths take
//! effect immediately (a dead agent is never stepped again); births are
//! queued and join the population after the pass, so a newborn is first
//! stepped on the following tick.

pub mod agent;
pub mod context;
pub mod error;
pub mod population;
pub mod scheduler;


pub use agent::Agent;
pub use context::StepContext;
pub use error::{AgentError, AgentResult, SchedulerError, SchedulerResult};
pub use population::Population;
pub use scheduler::{Scheduler, TickVisit};
