//! Simulation time model.
//!
//! # Design
//!
//! Time is represented as a monotonically increasing `Tick` counter.  The
//! mapping to model time is an exact fraction held in `SimulationTime`:
//!
//!   model_time = tick * step
//!
//! `step` is a reduced `Rational`, so a model running at 1/3 time units per
//! tick never accumulates floating-point drift.  Wall-clock bookkeeping
//! (run start, per-tick elapsed time) lives alongside and is only used for
//! throttling and row headers; it never feeds back into model time.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// `true` when this tick falls on an `interval` boundary.
    ///
    /// An interval of 0 is treated as 1 (every tick).
    #[inline]
    pub fn is_multiple_of(self, interval: u64) -> bool {
        self.0.is_multiple_of(interval.max(1))
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── Rational ─────────────────────────────────────────────────────────────────

/// A non-negative exact fraction, always stored in lowest terms.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Rational {
    numer: u64,
    denom: u64,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Rational {
    pub const ZERO: Rational = Rational { numer: 0, denom: 1 };
    pub const ONE: Rational = Rational { numer: 1, denom: 1 };

    /// Build `numer / denom`, reduced.  A zero denominator is rejected.
    pub fn new(numer: u64, denom: u64) -> CoreResult<Self> {
        if denom == 0 {
            return Err(CoreError::InvalidTimeStep { numer, denom });
        }
        let g = gcd(numer, denom).max(1);
        Ok(Self { numer: numer / g, denom: denom / g })
    }

    #[inline]
    pub fn integer(n: u64) -> Self {
        Self { numer: n, denom: 1 }
    }

    #[inline]
    pub fn numer(self) -> u64 {
        self.numer
    }

    #[inline]
    pub fn denom(self) -> u64 {
        self.denom
    }

    /// `self * k`, reduced.  Cross-cancels before multiplying so the
    /// intermediate stays small; saturates instead of wrapping.
    pub fn times(self, k: u64) -> Self {
        let g = gcd(k, self.denom).max(1);
        Self {
            numer: self.numer.saturating_mul(k / g),
            denom: self.denom / g,
        }
    }

    /// Lossy conversion for display and plotting.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ONE
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.numer as u128 * other.denom as u128;
        let rhs = other.numer as u128 * self.denom as u128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

// ── SimulationTime ───────────────────────────────────────────────────────────

/// Tick counter, exact model time and wall-clock bookkeeping for one run.
///
/// Created with the model, [`reset`](Self::reset) at setup and advanced by
/// exactly one tick per completed loop iteration.  The tick never decreases.
#[derive(Clone, Debug)]
pub struct SimulationTime {
    tick:              Tick,
    step:              Rational,
    run_started:       Option<Instant>,
    run_started_ms:    u64,
    tick_started:      Option<Instant>,
    last_tick_elapsed: Duration,
}

impl SimulationTime {
    pub fn new(step: Rational) -> Self {
        Self {
            tick:              Tick::ZERO,
            step,
            run_started:       None,
            run_started_ms:    0,
            tick_started:      None,
            last_tick_elapsed: Duration::ZERO,
        }
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[inline]
    pub fn step(&self) -> Rational {
        self.step
    }

    /// Exact model time of the current tick.
    #[inline]
    pub fn model_time(&self) -> Rational {
        self.step.times(self.tick.0)
    }

    /// Return to tick 0 and forget all wall-clock state.
    pub fn reset(&mut self) {
        self.tick = Tick::ZERO;
        self.run_started = None;
        self.run_started_ms = 0;
        self.tick_started = None;
        self.last_tick_elapsed = Duration::ZERO;
    }

    /// Record the wall-clock start of the run.
    pub fn start_run(&mut self) {
        self.run_started = Some(Instant::now());
        self.run_started_ms = unix_millis();
    }

    /// Mark the wall-clock start of the current tick.
    pub fn begin_tick(&mut self) {
        self.tick_started = Some(Instant::now());
    }

    /// Wall-clock time spent so far in the current tick.
    pub fn time_in_tick(&self) -> Duration {
        self.tick_started.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Close the current tick: record its elapsed time and move to the next.
    pub fn advance(&mut self) {
        self.last_tick_elapsed = self.time_in_tick();
        self.tick_started = None;
        self.tick = Tick(self.tick.0 + 1);
    }

    /// Wall-clock duration of the most recently completed tick.
    #[inline]
    pub fn last_tick_elapsed(&self) -> Duration {
        self.last_tick_elapsed
    }

    /// Wall-clock time since [`start_run`](Self::start_run).
    pub fn run_elapsed(&self) -> Duration {
        self.run_started.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Unix milliseconds at which the run started (0 before the first run).
    #[inline]
    pub fn run_started_unix_ms(&self) -> u64 {
        self.run_started_ms
    }

    /// Current Unix time in milliseconds, stamped into row headers.
    pub fn wall_clock_ms(&self) -> u64 {
        unix_millis()
    }
}

impl Default for SimulationTime {
    fn default() -> Self {
        Self::new(Rational::ONE)
    }
}

impl fmt::Display for SimulationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (t={})", self.tick, self.model_time())
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
