//! `SimulationSession` — waits for `Start`, runs, and restarts on demand.

use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::{
    Command, ControlCommand, Engine, EngineHandle, ExitReason, Model, RunReport, SimError,
    SimResult, StartOptions,
};

/// Why a session stopped serving.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEnd {
    Exit,
    /// The application should load this model and start a new session.
    LoadModel(String),
    /// The mailbox was closed.
    Closed,
}

#[derive(Debug)]
pub struct SessionOutcome {
    /// One report per run, in order.
    pub reports: Vec<RunReport>,
    pub end:     SessionEnd,
}

/// The context object around one engine.
///
/// Between runs the session blocks on the mailbox: `Start` begins a run,
/// `Exit` and `LoadModel` end the session, `Stop` is ignored and every other
/// command executes against the idle model.  A `Start` received during a
/// run ends it and starts the next one with the new options.
pub struct SimulationSession<M: Model> {
    engine: Engine<M>,
}

impl<M: Model> SimulationSession<M> {
    pub fn new(engine: Engine<M>) -> Self {
        Self { engine }
    }

    pub fn handle(&self) -> EngineHandle<M> {
        self.engine.handle()
    }

    pub fn engine(&self) -> &Engine<M> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<M> {
        &mut self.engine
    }

    /// Block until the next `Start`.  Non-control commands execute while
    /// waiting.
    pub fn await_start(&mut self) -> Result<StartOptions, SessionEnd> {
        let mailbox = self.engine.mailbox().clone();
        loop {
            let mut next = None;
            if !mailbox.receive(|cmd| next = Some(cmd)) {
                return Err(SessionEnd::Closed);
            }
            match next {
                Some(Command::Control(ControlCommand::Start(opts))) => return Ok(opts),
                Some(Command::Control(ControlCommand::Exit)) => return Err(SessionEnd::Exit),
                Some(Command::Control(ControlCommand::LoadModel(name))) => {
                    return Err(SessionEnd::LoadModel(name));
                }
                Some(Command::Control(ControlCommand::Stop)) => debug!("stop while idle ignored"),
                Some(cmd) => {
                    self.engine.execute(cmd);
                }
                None => {}
            }
        }
    }

    /// Run with `opts`, following `Start` restarts.  Returns the reports and,
    /// if a run ended the session, why.
    pub fn drive(&mut self, mut opts: StartOptions) -> SimResult<(Vec<RunReport>, Option<SessionEnd>)> {
        let mut reports = Vec::new();
        loop {
            self.engine.apply_start(&opts)?;
            let report = self.engine.run()?;
            let exit = report.exit.clone();
            reports.push(report);
            match exit {
                ExitReason::Restart(next) => {
                    info!("restarting run");
                    opts = next;
                }
                ExitReason::Exit => return Ok((reports, Some(SessionEnd::Exit))),
                ExitReason::LoadModel(name) => return Ok((reports, Some(SessionEnd::LoadModel(name)))),
                _ => return Ok((reports, None)),
            }
        }
    }

    /// Serve commands until `Exit`, `LoadModel` or the mailbox closes.
    pub fn serve(&mut self) -> SimResult<SessionOutcome> {
        let mut reports = Vec::new();
        loop {
            let opts = match self.await_start() {
                Ok(opts) => opts,
                Err(end) => return Ok(SessionOutcome { reports, end }),
            };
            let (mut runs, end) = self.drive(opts)?;
            reports.append(&mut runs);
            if let Some(end) = end {
                return Ok(SessionOutcome { reports, end });
            }
        }
    }

    /// Move the session onto its own thread and serve from there.
    pub fn spawn(self) -> SimResult<(EngineHandle<M>, JoinHandle<SimResult<SessionOutcome>>)> {
        let handle = self.handle();
        let mut session = self;
        let join = thread::Builder::new()
            .name("abm-engine".into())
            .spawn(move || session.serve())
            .map_err(SimError::Spawn)?;
        Ok((handle, join))
    }
}
