//! `EngineHandle` — typed sender for an engine's mailbox.

use abm_command::Mailbox;
use abm_core::DataValue;
use abm_data::DataCollectorDescriptor;

use crate::{
    AddDataCollector, Command, ControlCommand, ControlEvent, ForwardControlEvent, InvokeMethod,
    Model, PauseResume, RemoveDataCollector, SetDelay, SetFrequency, SetSeed, SetVariableValue,
    SimCommand, SimResult, StartOptions,
};

/// Cloneable, `Send` handle for queuing commands from any thread.
///
/// Sending never waits for execution.  Commands from one handle execute in
/// the order they were sent.  Every method fails once the engine is gone.
pub struct EngineHandle<M: Model> {
    mailbox: Mailbox<Command<M>>,
}

impl<M: Model> Clone for EngineHandle<M> {
    fn clone(&self) -> Self {
        Self { mailbox: self.mailbox.clone() }
    }
}

impl<M: Model> EngineHandle<M> {
    pub(crate) fn new(mailbox: Mailbox<Command<M>>) -> Self {
        Self { mailbox }
    }

    pub fn send(&self, cmd: Command<M>) -> SimResult<()> {
        Ok(self.mailbox.send(cmd)?)
    }

    /// Queue an application-defined command.
    pub fn submit<C: SimCommand<M> + 'static>(&self, cmd: C) -> SimResult<()> {
        self.send(Command::sim(cmd))
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    // ── Control ───────────────────────────────────────────────────────────

    pub fn start(&self, opts: StartOptions) -> SimResult<()> {
        self.send(ControlCommand::Start(opts).into())
    }

    pub fn stop(&self) -> SimResult<()> {
        self.send(ControlCommand::Stop.into())
    }

    pub fn exit(&self) -> SimResult<()> {
        self.send(ControlCommand::Exit.into())
    }

    pub fn load_model(&self, name: impl Into<String>) -> SimResult<()> {
        self.send(ControlCommand::LoadModel(name.into()).into())
    }

    // ── Built-ins ─────────────────────────────────────────────────────────

    pub fn pause_resume(&self) -> SimResult<()> {
        self.submit(PauseResume)
    }

    pub fn set_seed(&self, seed: u64, use_time_seed: bool) -> SimResult<()> {
        self.submit(SetSeed { seed, use_time_seed })
    }

    pub fn set_variable(&self, name: impl Into<String>, value: DataValue) -> SimResult<()> {
        self.submit(SetVariableValue { name: name.into(), value })
    }

    pub fn invoke_method(&self, name: impl Into<String>) -> SimResult<()> {
        self.submit(InvokeMethod { name: name.into() })
    }

    pub fn add_collector(&self, descriptor: DataCollectorDescriptor) -> SimResult<()> {
        self.submit(AddDataCollector(descriptor))
    }

    pub fn remove_collector(&self, descriptor: DataCollectorDescriptor) -> SimResult<()> {
        self.submit(RemoveDataCollector(descriptor))
    }

    pub fn set_delay(&self, ms: u64) -> SimResult<()> {
        self.submit(SetDelay(ms))
    }

    pub fn set_frequency(&self, ticks_per_second: Option<f64>) -> SimResult<()> {
        self.submit(SetFrequency(ticks_per_second))
    }

    pub fn control_event(&self, event: ControlEvent) -> SimResult<()> {
        self.submit(ForwardControlEvent(event))
    }
}
