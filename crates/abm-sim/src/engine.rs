//! The `Engine` struct and its tick loop.

use std::sync::Arc;
use std::thread;

use abm_agent::Scheduler;
use abm_cluster::ClusterCoordinator;
use abm_command::Mailbox;
use abm_core::rng::time_seed;
use abm_core::{HookErrorPolicy, RunConfig, SimulationTime, Tick};
use abm_data::{DataRow, StateFlags, StateHeader};
use tracing::{debug, error, info, warn};

use crate::model::{ModelNode, ModelSource};
use crate::{
    Command, ControlCommand, EngineControl, EngineHandle, Model, RunState, SimError, SimResult,
    StartOptions,
};

// ── Run outcome ───────────────────────────────────────────────────────────────

/// Why a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitReason {
    /// The configured length was reached.
    Completed,
    Stopped,
    Exit,
    LoadModel(String),
    /// A `Start` arrived mid-run; the session restarts with these options.
    Restart(StartOptions),
    /// `begin` or `end` returned `true`.
    HookRequested,
    /// The cluster coordinator broadcast `Terminate`.
    ClusterTerminated,
}

impl From<ControlCommand> for ExitReason {
    fn from(cmd: ControlCommand) -> Self {
        match cmd {
            ControlCommand::Start(opts)     => ExitReason::Restart(opts),
            ControlCommand::Stop            => ExitReason::Stopped,
            ControlCommand::Exit            => ExitReason::Exit,
            ControlCommand::LoadModel(name) => ExitReason::LoadModel(name),
        }
    }
}

/// Summary of one completed [`Engine::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Ticks that reached the advance step.
    pub ticks_completed: u64,
    pub exit:            ExitReason,
    /// Rows emitted during the run, initial and final rows included.
    pub rows:            u64,
}

/// How one tick ended.
enum TickFlow {
    Continue,
    /// A hook failed and the policy abandons the rest of the tick.
    Skip,
    Stop(ExitReason),
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Owns one model and drives it through runs.
///
/// One call to [`run`](Self::run) is one run:
///
/// 1. **Setup**: reseed, reset the clock, `model.setup`, initial row.
/// 2. **Loop**, once per tick:
///    - drain the mailbox; a control command ends the run;
///    - while paused, poll the mailbox and emit `PAUSED` rows;
///    - `begin` → agents step → cluster sync → `update_data_layers` → `end`;
///    - emit the tick's row, then sleep for delay and frequency;
///    - advance the tick.
/// 3. **Finalize**: final row, collector reset, processor finalization and,
///    on the cluster coordinator, a `Terminate` broadcast.
///
/// Create via [`EngineBuilder`](crate::EngineBuilder).
pub struct Engine<M: Model> {
    pub(crate) model:     M,
    pub(crate) config:    RunConfig,
    pub(crate) time:      SimulationTime,
    pub(crate) control:   EngineControl,
    pub(crate) mailbox:   Mailbox<Command<M>>,
    pub(crate) scheduler: Scheduler,
    pub(crate) cluster:   Option<ClusterCoordinator>,
}

impl<M: Model> Engine<M> {
    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn time(&self) -> &SimulationTime {
        &self.time
    }

    pub fn control(&self) -> &EngineControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut EngineControl {
        &mut self.control
    }

    pub fn state(&self) -> RunState {
        self.control.state()
    }

    pub fn cluster(&self) -> Option<&ClusterCoordinator> {
        self.cluster.as_ref()
    }

    /// A new sending handle onto this engine's mailbox.
    pub fn handle(&self) -> EngineHandle<M> {
        EngineHandle::new(self.mailbox.clone())
    }

    pub fn mailbox(&self) -> &Mailbox<Command<M>> {
        &self.mailbox
    }

    /// Cluster peers follow the coordinator and never end a run on their own
    /// length.
    fn is_peer(&self) -> bool {
        self.cluster.as_ref().is_some_and(|c| !c.is_coordinator())
    }

    // ── Start options ─────────────────────────────────────────────────────

    /// Apply a `Start` command's options to the next run.
    pub fn apply_start(&mut self, opts: &StartOptions) -> SimResult<()> {
        if opts.length.is_some() {
            self.control.set_length(opts.length);
        }
        self.control.paused = opts.paused;
        if let Some(observer) = &opts.observer {
            info!(observer = %observer, "observer attached");
            self.control.observer = Some(observer.clone());
        }
        if let Some(mode) = opts.mode {
            if mode != self.scheduler.mode() {
                self.config.mode = mode;
                self.scheduler = scheduler_for(&self.config)?;
                info!(?mode, "execution mode changed");
            }
            self.control.mode = mode;
        }
        Ok(())
    }

    // ── Run ───────────────────────────────────────────────────────────────

    /// Execute one run from setup to finalization.
    ///
    /// Returns once the run is `Terminated`.  Errors from setup, the cluster
    /// or an `AbortRun` hook failure are returned after the data pipeline
    /// has been finalized.
    pub fn run(&mut self) -> SimResult<RunReport> {
        let rows_before = self.control.data.rows_emitted();
        self.control.stop = None;

        if let Err(e) = self.setup() {
            error!(error = %e, "setup failed");
            if let Err(fin) = self.control.data.finish() {
                warn!(error = %fin, "data pipeline finalize failed after setup error");
            }
            self.control.state = RunState::Terminated;
            return Err(e);
        }

        let outcome = self.run_loop();
        if let Err(e) = &outcome {
            error!(tick = self.time.tick().0, error = %e, "run aborted");
        }
        let terminated = !matches!(outcome, Ok(ExitReason::Completed));
        let finished = self.finalize(terminated);
        let exit = outcome?;
        finished?;

        let report = RunReport {
            ticks_completed: self.time.tick().0,
            exit,
            rows: self.control.data.rows_emitted() - rows_before,
        };
        info!(ticks = report.ticks_completed, rows = report.rows, exit = ?report.exit, "run finished");
        Ok(report)
    }

    fn setup(&mut self) -> SimResult<()> {
        self.control.state = RunState::Setup;
        self.control.pending_actions.clear();

        let seed = if self.control.use_time_seed { time_seed() } else { self.control.seed() };
        self.control.rng.reseed(seed);
        self.model.population_mut().reseed(seed);
        self.time.reset();

        self.model.setup(&mut self.control.rng)?;

        self.time.start_run();
        self.control.state = RunState::Running;
        info!(
            seed,
            agents = self.model.population().len(),
            mode = ?self.scheduler.mode(),
            paused = self.control.paused,
            "run started"
        );

        let mut flags = StateFlags::INITIAL_STATE;
        if self.control.paused {
            flags |= StateFlags::PAUSED;
        }
        self.emit(flags);
        Ok(())
    }

    fn run_loop(&mut self) -> SimResult<ExitReason> {
        loop {
            if !self.is_peer() {
                if let Some(length) = self.control.length() {
                    if self.time.tick().0 >= length {
                        return Ok(ExitReason::Completed);
                    }
                }
            }

            self.drain_commands();
            if let Some(reason) = self.control.stop.take() {
                return Ok(reason);
            }
            if self.control.paused {
                if let Some(reason) = self.pause_loop() {
                    return Ok(reason);
                }
            }

            self.time.begin_tick();
            match self.run_tick()? {
                TickFlow::Continue | TickFlow::Skip => {}
                TickFlow::Stop(reason) => return Ok(reason),
            }
            self.throttle();
            self.time.advance();
        }
    }

    /// Spin on the mailbox until resumed or stopped.  Returns the stop
    /// reason if the run should end.
    fn pause_loop(&mut self) -> Option<ExitReason> {
        let poll = self.config.pause_poll();
        info!(tick = self.time.tick().0, "paused");
        while self.control.paused {
            thread::sleep(poll);
            if self.drain_commands() == 0 {
                continue;
            }
            if let Some(reason) = self.control.stop.take() {
                return Some(reason);
            }
            if self.control.paused {
                self.emit(StateFlags::PAUSED);
            }
        }
        info!(tick = self.time.tick().0, "resumed");
        None
    }

    fn run_tick(&mut self) -> SimResult<TickFlow> {
        let flow = self.step_model()?;
        if let Some(reason) = self.sync_cluster()? {
            return Ok(TickFlow::Stop(reason));
        }
        match flow {
            TickFlow::Continue => self.finish_tick(),
            other => Ok(other),
        }
    }

    /// `begin`, then one scheduler pass.
    fn step_model(&mut self) -> SimResult<TickFlow> {
        match self.model.begin(&self.time) {
            Ok(true) => return Ok(TickFlow::Stop(ExitReason::HookRequested)),
            Ok(false) => {}
            Err(e) => return self.hook_failed("begin", e),
        }
        match self.scheduler.process_all_agents(self.model.population_mut(), &self.time) {
            Ok(visit) => {
                debug!(
                    tick = self.time.tick().0,
                    stepped = visit.stepped,
                    died = visit.died,
                    born = visit.born,
                    failed = visit.failures.len(),
                    "agents visited"
                );
                Ok(TickFlow::Continue)
            }
            Err(e) => self.hook_failed("step", e.into()),
        }
    }

    /// Run this tick's cluster command.  Runs even when the tick was
    /// abandoned so every node stays on the same command.
    fn sync_cluster(&mut self) -> SimResult<Option<ExitReason>> {
        let pending = std::mem::take(&mut self.control.pending_actions);
        let Some(cluster) = self.cluster.as_mut() else {
            if !pending.is_empty() {
                debug!(discarded = pending.len(), "cluster actions queued without a cluster");
            }
            return Ok(None);
        };
        let outcome = cluster.tick(pending, &mut ModelNode(&mut self.model))?;
        if outcome.terminated {
            info!(rank = cluster.rank().0, tick = self.time.tick().0, "cluster terminated");
            return Ok(Some(ExitReason::ClusterTerminated));
        }
        Ok(None)
    }

    /// `update_data_layers`, `end`, then the tick's row.
    fn finish_tick(&mut self) -> SimResult<TickFlow> {
        if let Err(e) = self.model.update_data_layers(&self.time) {
            return self.hook_failed("update_data_layers", e);
        }
        match self.model.end(&self.time) {
            Ok(true) => return Ok(TickFlow::Stop(ExitReason::HookRequested)),
            Ok(false) => {}
            Err(e) => return self.hook_failed("end", e),
        }
        self.emit(StateFlags::NONE);
        Ok(TickFlow::Continue)
    }

    fn hook_failed(&self, hook: &'static str, err: SimError) -> SimResult<TickFlow> {
        let tick = self.time.tick();
        match self.config.hook_error_policy {
            HookErrorPolicy::AbortRun => Err(SimError::Hook { hook, tick, source: Box::new(err) }),
            HookErrorPolicy::AbortTick | HookErrorPolicy::SkipAgent => {
                warn!(hook, tick = tick.0, error = %err, "hook failed, rest of tick skipped");
                Ok(TickFlow::Skip)
            }
        }
    }

    /// Fixed delay first, then sleep whatever remains of the tick period.
    fn throttle(&self) {
        let delay = self.control.delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if let Some(period) = self.control.tick_period() {
            if let Some(rest) = period.checked_sub(self.time.time_in_tick()) {
                thread::sleep(rest);
            }
        }
    }

    fn finalize(&mut self, terminated: bool) -> SimResult<()> {
        self.control.state = RunState::Stopping;
        let mut flags = StateFlags::FINAL_STATE;
        if terminated {
            flags |= StateFlags::TERMINATED;
        }
        self.emit(flags);
        let finished = self.control.data.finish();

        if let Some(cluster) = self.cluster.as_mut().filter(|c| c.is_coordinator()) {
            if let Err(e) = cluster.terminate(&mut ModelNode(&mut self.model)) {
                warn!(error = %e, "terminate broadcast failed");
            }
        }

        self.control.paused = self.config.start_paused;
        self.control.state = RunState::Terminated;
        finished.map_err(SimError::from)
    }

    // ── Commands and rows ─────────────────────────────────────────────────

    /// Execute queued commands until a control command is met.  Returns the
    /// number executed.
    pub(crate) fn drain_commands(&mut self) -> usize {
        let mailbox = self.mailbox.clone();
        mailbox.drain_until(|cmd| self.execute(cmd))
    }

    /// Returns `false` for control commands, which end the current run.
    pub(crate) fn execute(&mut self, cmd: Command<M>) -> bool {
        let tick = self.time.tick().0;
        match cmd {
            Command::Control(control) => {
                info!(tick, command = ?control, "control command");
                self.control.request_stop(control.into());
                false
            }
            Command::Sim(cmd) => {
                let name = cmd.name();
                debug!(tick, command = name, "executing command");
                if let Err(e) = cmd.execute(&mut self.model, &mut self.control) {
                    warn!(tick, command = name, error = %e, "command failed");
                }
                true
            }
        }
    }

    fn emit(&mut self, flags: StateFlags) -> Arc<DataRow> {
        let header = StateHeader {
            tick:         self.time.tick(),
            model_time:   self.time.model_time(),
            wall_time_ms: self.time.wall_clock_ms(),
            seed:         self.control.seed(),
            flags,
        };
        self.control.data.emit(&ModelSource(&self.model), &self.time, header)
    }

    /// Tick the next row will carry.
    pub fn tick(&self) -> Tick {
        self.time.tick()
    }
}

impl<M: Model> Drop for Engine<M> {
    fn drop(&mut self) {
        self.mailbox.close();
    }
}

/// Scheduler for `config`; failed steps only end the pass when the hook
/// policy could act on them.
pub(crate) fn scheduler_for(config: &RunConfig) -> SimResult<Scheduler> {
    let stop_on_error = config.hook_error_policy != HookErrorPolicy::SkipAgent;
    Ok(Scheduler::from_config(config)?.stop_on_error(stop_on_error))
}
