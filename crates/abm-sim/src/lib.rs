//! `abm-sim` — the simulation engine: run state machine, tick loop, command
//! set and sessions.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                      |
//! |-----------------|---------------------------------------------------------------|
//! | [`model`]       | `Model` trait — population plus per-tick hooks                |
//! | [`engine`]      | `Engine`, `ExitReason`, `RunReport` — the tick loop           |
//! | [`builder`]     | `EngineBuilder` — fluent engine construction                  |
//! | [`control`]     | `EngineControl`, `RunState` — what commands may change        |
//! | [`command`]     | `ControlCommand`, `SimCommand` and the built-in commands      |
//! | [`handle`]      | `EngineHandle` — typed mailbox sender                         |
//! | [`session`]     | `SimulationSession` — start, restart, exit                    |
//! | [`error`]       | `SimError`, `SimResult<T>`                                    |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use abm_sim::{EngineBuilder, SimulationSession, StartOptions};
//!
//! let engine = EngineBuilder::new(model, config)
//!     .collector(DataCollectorDescriptor::variable("count", 1))
//!     .processor(sink)
//!     .build()?;
//! let (handle, join) = SimulationSession::new(engine).spawn()?;
//! handle.start(StartOptions { length: Some(100), ..Default::default() })?;
//! handle.exit()?;
//! let outcome = join.join().expect("engine thread panicked")?;
//! ```
//!
//! # Threading
//!
//! The engine runs on one thread.  Commands cross threads only through the
//! mailbox and execute on the engine thread between ticks, never while
//! agents are being visited.

pub mod builder;
pub mod command;
pub mod control;
pub mod engine;
pub mod error;
pub mod handle;
pub mod model;
pub mod session;

#[cfg(test)]
mod tests;

pub use builder::EngineBuilder;
pub use command::{
    AddDataCollector, Command, ControlCommand, ControlEvent, ForwardControlEvent, InvokeMethod,
    PauseResume, RemoveDataCollector, SetDelay, SetFrequency, SetSeed, SetVariableValue,
    SimCommand, StartOptions,
};
pub use control::{EngineControl, RunState};
pub use engine::{Engine, ExitReason, RunReport};
pub use error::{SimError, SimResult};
pub use handle::EngineHandle;
pub use model::Model;
pub use session::{SessionEnd, SessionOutcome, SimulationSession};
