//! The engine's command set.
//!
//! Commands reach the engine through its [`Mailbox`](abm_command::Mailbox)
//! and execute on the engine thread, either at the top of a tick or inside
//! the pause loop, in send order.
//!
//! Two families:
//!
//! - [`ControlCommand`] — closed enum of run-ending commands.  The engine
//!   pattern-matches them, stops the current run and reports why in
//!   [`ExitReason`](crate::ExitReason).
//! - [`SimCommand`] — everything else.  Executes against the model and the
//!   engine's [`EngineControl`]; applications add their own by implementing
//!   the trait.

use std::fmt;

use abm_core::rng::time_seed;
use abm_core::{DataValue, ExecutionMode, RunConfig};
use abm_data::DataCollectorDescriptor;
use serde::{Deserialize, Serialize};

use crate::{EngineControl, Model, SimError, SimResult};

// ── Control commands ──────────────────────────────────────────────────────────

/// Parameters of a `Start` command.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    /// Ticks to run.  `None` keeps the configured length.
    pub length:   Option<u64>,
    /// Enter the pause loop right after setup.
    pub paused:   bool,
    /// Name of the observer the caller is attaching, for logs.
    pub observer: Option<String>,
    /// Switch the agent visitation strategy.  `None` keeps the current one.
    pub mode:     Option<ExecutionMode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCommand {
    /// (Re)start with the given options.  While a run is in progress the
    /// run ends and the session restarts it.
    Start(StartOptions),
    Stop,
    Exit,
    LoadModel(String),
}

/// A user-interface event forwarded to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlEvent {
    Key {
        code:    String,
        pressed: bool,
    },
    Mouse {
        x:       f64,
        y:       f64,
        button:  u8,
        pressed: bool,
    },
}

// ── SimCommand ────────────────────────────────────────────────────────────────

/// A non-control command.
///
/// Runs once, on the engine thread, with exclusive access to the model and
/// the engine's control block.  An error is logged and the command dropped;
/// it never ends the run.
pub trait SimCommand<M: Model>: Send {
    fn name(&self) -> &'static str;

    fn execute(self: Box<Self>, model: &mut M, control: &mut EngineControl) -> SimResult<()>;
}

/// What travels through the engine's mailbox.
pub enum Command<M: Model> {
    Control(ControlCommand),
    Sim(Box<dyn SimCommand<M>>),
}

impl<M: Model> Command<M> {
    pub fn sim<C: SimCommand<M> + 'static>(cmd: C) -> Self {
        Command::Sim(Box::new(cmd))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Control(ControlCommand::Start(_))     => "start",
            Command::Control(ControlCommand::Stop)         => "stop",
            Command::Control(ControlCommand::Exit)         => "exit",
            Command::Control(ControlCommand::LoadModel(_)) => "load_model",
            Command::Sim(c)                                => c.name(),
        }
    }
}

impl<M: Model> fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Control(c) => write!(f, "Command::Control({c:?})"),
            Command::Sim(c) => write!(f, "Command::Sim({})", c.name()),
        }
    }
}

impl<M: Model> From<ControlCommand> for Command<M> {
    fn from(c: ControlCommand) -> Self {
        Command::Control(c)
    }
}

// ── Built-in commands ─────────────────────────────────────────────────────────

/// Toggle Running ⇄ Paused.
#[derive(Clone, Copy, Debug, Default)]
pub struct PauseResume;

impl<M: Model> SimCommand<M> for PauseResume {
    fn name(&self) -> &'static str {
        "pause_resume"
    }

    fn execute(self: Box<Self>, _model: &mut M, control: &mut EngineControl) -> SimResult<()> {
        control.toggle_pause();
        Ok(())
    }
}

/// Replace the run seed.  Takes effect immediately for the run RNG and every
/// living agent, and for every later setup.
#[derive(Clone, Copy, Debug)]
pub struct SetSeed {
    pub seed:          u64,
    pub use_time_seed: bool,
}

impl<M: Model> SimCommand<M> for SetSeed {
    fn name(&self) -> &'static str {
        "set_seed"
    }

    fn execute(self: Box<Self>, model: &mut M, control: &mut EngineControl) -> SimResult<()> {
        let seed = if self.use_time_seed { time_seed() } else { self.seed };
        control.set_seed(seed, self.use_time_seed);
        model.population_mut().reseed(seed);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SetVariableValue {
    pub name:  String,
    pub value: DataValue,
}

impl<M: Model> SimCommand<M> for SetVariableValue {
    fn name(&self) -> &'static str {
        "set_variable_value"
    }

    fn execute(self: Box<Self>, model: &mut M, _control: &mut EngineControl) -> SimResult<()> {
        model.set_variable(&self.name, self.value)
    }
}

#[derive(Clone, Debug)]
pub struct InvokeMethod {
    pub name: String,
}

impl<M: Model> SimCommand<M> for InvokeMethod {
    fn name(&self) -> &'static str {
        "invoke_method"
    }

    fn execute(self: Box<Self>, model: &mut M, _control: &mut EngineControl) -> SimResult<()> {
        model.invoke_method(&self.name)
    }
}

#[derive(Clone, Debug)]
pub struct AddDataCollector(pub DataCollectorDescriptor);

impl<M: Model> SimCommand<M> for AddDataCollector {
    fn name(&self) -> &'static str {
        "add_data_collector"
    }

    fn execute(self: Box<Self>, _model: &mut M, control: &mut EngineControl) -> SimResult<()> {
        control.data_mut().add_collector(self.0);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RemoveDataCollector(pub DataCollectorDescriptor);

impl<M: Model> SimCommand<M> for RemoveDataCollector {
    fn name(&self) -> &'static str {
        "remove_data_collector"
    }

    fn execute(self: Box<Self>, _model: &mut M, control: &mut EngineControl) -> SimResult<()> {
        control.data_mut().remove_collector(&self.0);
        Ok(())
    }
}

/// Fixed sleep appended to every tick, in milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct SetDelay(pub u64);

impl<M: Model> SimCommand<M> for SetDelay {
    fn name(&self) -> &'static str {
        "set_delay"
    }

    fn execute(self: Box<Self>, _model: &mut M, control: &mut EngineControl) -> SimResult<()> {
        control.set_delay_ms(self.0);
        Ok(())
    }
}

/// Target ticks per second; `None` removes the throttle.
#[derive(Clone, Copy, Debug)]
pub struct SetFrequency(pub Option<f64>);

impl<M: Model> SimCommand<M> for SetFrequency {
    fn name(&self) -> &'static str {
        "set_frequency"
    }

    fn execute(self: Box<Self>, _model: &mut M, control: &mut EngineControl) -> SimResult<()> {
        if let Some(f) = self.0 {
            if RunConfig::period_for(f).is_none() {
                return Err(SimError::InvalidValue {
                    name:   "frequency".into(),
                    reason: format!("{f} is not a positive rate with a representable period"),
                });
            }
        }
        control.set_frequency(self.0);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ForwardControlEvent(pub ControlEvent);

impl<M: Model> SimCommand<M> for ForwardControlEvent {
    fn name(&self) -> &'static str {
        "control_event"
    }

    fn execute(self: Box<Self>, model: &mut M, _control: &mut EngineControl) -> SimResult<()> {
        model.on_control_event(&self.0)
    }
}
