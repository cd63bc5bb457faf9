//! Run configuration.
//!
//! Typically loaded from a TOML file by the application crate and handed to
//! the engine builder.  Every field has a default, so a config file only
//! needs to mention what it changes:
//!
//! ```toml
//! length = 500
//! seed   = 7
//! mode   = "parallel"
//! frequency = 30.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, Rational};

/// In-process agent visitation policy for one tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Single thread, slot order.  Deterministic for a fixed seed.
    #[default]
    Serial,
    /// Scoped worker threads over disjoint partitions of the population.
    Concurrent,
    /// Rayon fork-join map with deferred tombstone compaction.
    Parallel,
}

/// What the engine does when a model hook (`begin`, `step`, `end`) fails.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookErrorPolicy {
    /// Stop the run, emit the final row and return the error.
    #[default]
    AbortRun,
    /// Log, abandon the rest of the tick, continue with the next one.
    AbortTick,
    /// Log and skip the failing agent; `begin`/`end` failures abort the tick.
    SkipAgent,
}

/// Top-level configuration of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Ticks to simulate.  `None` runs until stopped.
    pub length: Option<u64>,

    /// Run seed.  The same seed always produces identical Serial runs.
    pub seed: u64,

    /// Ignore `seed` and derive one from the wall clock at setup.
    pub use_time_seed: bool,

    /// Agent visitation strategy.
    pub mode: ExecutionMode,

    /// Worker count for the Concurrent and Parallel strategies.  `None` uses
    /// all logical cores.
    pub worker_threads: Option<usize>,

    /// Fixed sleep appended to every tick, in milliseconds.
    pub delay_ms: u64,

    /// Target ticks per second.  `None` runs unthrottled.
    pub frequency: Option<f64>,

    /// Sleep between command checks while paused, in milliseconds.
    pub pause_poll_ms: u64,

    /// Tombstone fraction above which the population is compacted.
    pub compaction_threshold: f64,

    pub hook_error_policy: HookErrorPolicy,

    /// Enter the pause loop immediately after setup.
    pub start_paused: bool,

    /// Model time covered by one tick.
    pub time_step: Rational,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            length:               None,
            seed:                 0,
            use_time_seed:        false,
            mode:                 ExecutionMode::Serial,
            worker_threads:       None,
            delay_ms:             0,
            frequency:            None,
            pause_poll_ms:        1,
            compaction_threshold: 0.1,
            hook_error_policy:    HookErrorPolicy::AbortRun,
            start_paused:         false,
            time_step:            Rational::ONE,
        }
    }
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(f) = self.frequency {
            if Self::period_for(f).is_none() {
                return Err(CoreError::Config(format!(
                    "frequency must be positive with a representable period, got {f}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.compaction_threshold) {
            return Err(CoreError::Config(format!(
                "compaction_threshold must be within [0, 1], got {}",
                self.compaction_threshold
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(CoreError::Config("worker_threads must be at least 1".into()));
        }
        if self.time_step.denom() == 0 {
            return Err(CoreError::InvalidTimeStep {
                numer: self.time_step.numer(),
                denom: self.time_step.denom(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    #[inline]
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    /// Target wall-clock duration of one tick, if a frequency is set.
    pub fn tick_period(&self) -> Option<Duration> {
        self.frequency.and_then(Self::period_for)
    }

    /// Tick period for `frequency` ticks per second.  `None` when the rate is
    /// not positive or the period does not fit a `Duration`.
    pub fn period_for(frequency: f64) -> Option<Duration> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / frequency).ok()
    }

    /// Worker count to use for the fan-out strategies.
    pub fn effective_workers(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }
}
