//! `EngineControl` — the engine state commands are allowed to touch.

use std::fmt;
use std::time::Duration;

use abm_cluster::Action;
use abm_core::{ExecutionMode, RunConfig, SimRng};
use abm_data::DataSet;
use tracing::info;

use crate::ExitReason;

/// Engine life cycle.
///
/// ```text
/// Setup → Running ⇄ Paused → Stopping → Terminated
///   └──────────────→ Paused (start paused)
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Setup,
    Running,
    Paused,
    Stopping,
    Terminated,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Setup      => "setup",
            RunState::Running    => "running",
            RunState::Paused     => "paused",
            RunState::Stopping   => "stopping",
            RunState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Run parameters and pipeline owned by the engine, handed to every
/// [`SimCommand`](crate::SimCommand).
pub struct EngineControl {
    pub(crate) state:           RunState,
    pub(crate) paused:          bool,
    pub(crate) stop:            Option<ExitReason>,
    pub(crate) delay:           Duration,
    pub(crate) frequency:       Option<f64>,
    pub(crate) length:          Option<u64>,
    pub(crate) rng:             SimRng,
    pub(crate) use_time_seed:   bool,
    pub(crate) data:            DataSet,
    pub(crate) mode:            ExecutionMode,
    pub(crate) observer:        Option<String>,
    pub(crate) pending_actions: Vec<Action>,
}

impl EngineControl {
    pub(crate) fn new(config: &RunConfig, data: DataSet) -> Self {
        Self {
            state:           RunState::Setup,
            paused:          config.start_paused,
            stop:            None,
            delay:           config.delay(),
            frequency:       config.frequency,
            length:          config.length,
            rng:             SimRng::new(config.seed),
            use_time_seed:   config.use_time_seed,
            data,
            mode:            config.mode,
            observer:        None,
            pending_actions: Vec::new(),
        }
    }

    // ── State ─────────────────────────────────────────────────────────────

    /// Current life-cycle state; `Paused` while a running engine is paused.
    pub fn state(&self) -> RunState {
        match self.state {
            RunState::Running if self.paused => RunState::Paused,
            s => s,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        info!(paused = self.paused, "pause toggled");
    }

    /// End the current run after the command batch.  The first request of a
    /// run wins.
    pub fn request_stop(&mut self, reason: ExitReason) {
        if self.stop.is_none() {
            self.stop = Some(reason);
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_some()
    }

    // ── Pacing ────────────────────────────────────────────────────────────

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay_ms(&mut self, ms: u64) {
        self.delay = Duration::from_millis(ms);
    }

    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: Option<f64>) {
        self.frequency = frequency;
    }

    /// Wall-clock period of one tick under the current frequency.
    pub fn tick_period(&self) -> Option<Duration> {
        self.frequency.and_then(RunConfig::period_for)
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn set_length(&mut self, length: Option<u64>) {
        self.length = length;
    }

    // ── Randomness ────────────────────────────────────────────────────────

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    pub fn set_seed(&mut self, seed: u64, use_time_seed: bool) {
        self.rng.reseed(seed);
        self.use_time_seed = use_time_seed;
    }

    // ── Data and cluster ──────────────────────────────────────────────────

    pub fn data(&self) -> &DataSet {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataSet {
        &mut self.data
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn observer(&self) -> Option<&str> {
        self.observer.as_deref()
    }

    /// Append an action to this tick's cluster command.  Only the
    /// coordinator's queue is broadcast; single-node engines discard it.
    pub fn queue_cluster_action(&mut self, action: Action) {
        self.pending_actions.push(action);
    }
}
