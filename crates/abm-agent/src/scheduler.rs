//! `Scheduler` — visits every living agent once per tick.
//!
//! # Strategies
//!
//! | Mode         | Fan-out                                   | Order                 |
//! |--------------|-------------------------------------------|-----------------------|
//! | `Serial`     | none                                      | slot order            |
//! | `Concurrent` | `std::thread::scope`, contiguous chunks   | slot order per chunk  |
//! | `Parallel`   | Rayon map over the slot range             | work-stealing         |
//!
//! All three finish the same way: dead slots become tombstones, queued
//! births join, and the arena is compacted once tombstones pass the
//! threshold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use abm_core::{AgentId, ExecutionMode, RunConfig, SimulationTime};
use rayon::prelude::*;
use tracing::warn;

use crate::population::SlotVisit;
use crate::{Agent, AgentError, AgentResult, Population, SchedulerError, SchedulerResult};

/// What one visitation pass did.
#[derive(Debug, Default)]
pub struct TickVisit {
    /// Agents whose `step` ran.
    pub stepped:   usize,
    /// Slots tombstoned at the end of the pass.
    pub died:      usize,
    /// Queued births that joined the population.
    pub born:      usize,
    pub compacted: bool,
    /// Failed steps, when the scheduler does not stop on errors.
    pub failures:  Vec<(AgentId, AgentError)>,
}

pub struct Scheduler {
    mode:                 ExecutionMode,
    workers:              usize,
    compaction_threshold: f64,
    stop_on_error:        bool,
    pool:                 Option<rayon::ThreadPool>,
}

impl Scheduler {
    /// `pool_threads` sizes a dedicated Rayon pool for the Parallel
    /// strategy; `None` uses the global pool.
    pub fn new(
        mode:                 ExecutionMode,
        workers:              usize,
        pool_threads:         Option<usize>,
        compaction_threshold: f64,
    ) -> AgentResult<Self> {
        let pool = match (mode, pool_threads) {
            (ExecutionMode::Parallel, Some(n)) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("abm-worker-{i}"))
                    .build()
                    .map_err(|e| AgentError::Pool(e.to_string()))?,
            ),
            _ => None,
        };
        Ok(Self {
            mode,
            workers: workers.max(1),
            compaction_threshold,
            stop_on_error: true,
            pool,
        })
    }

    pub fn from_config(config: &RunConfig) -> AgentResult<Self> {
        Self::new(
            config.mode,
            config.effective_workers(),
            config.worker_threads,
            config.compaction_threshold,
        )
    }

    /// With `false`, failed steps are logged and reported in
    /// [`TickVisit::failures`] instead of ending the pass.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run one visitation pass over `population`.
    ///
    /// Tombstoning, births and compaction happen even when the pass ends in
    /// an error, so the population is consistent either way.
    pub fn process_all_agents<A: Agent>(
        &self,
        population: &mut Population<A>,
        time:       &SimulationTime,
    ) -> SchedulerResult<TickVisit> {
        let stop = AtomicBool::new(false);
        let visits = match self.mode {
            ExecutionMode::Serial => self.visit_serial(population, time, &stop),
            ExecutionMode::Concurrent => self.visit_concurrent(population, time, &stop),
            ExecutionMode::Parallel => self.visit_parallel(population, time, &stop),
        };

        let mut report = TickVisit::default();
        let mut first_failure = None;
        for visit in visits {
            match visit {
                SlotVisit::Idle => {}
                SlotVisit::Stepped => report.stepped += 1,
                SlotVisit::Failed(agent, e) => {
                    report.stepped += 1;
                    if self.stop_on_error {
                        first_failure.get_or_insert((agent, e));
                    } else {
                        warn!(%agent, tick = time.tick().0, error = %e, "agent step failed");
                        report.failures.push((agent, e));
                    }
                }
            }
        }

        let dead = match self.mode {
            ExecutionMode::Parallel => population.par_dead_slots(),
            _ => population.dead_slots(),
        };
        report.died = population.reap(dead);
        report.born = population.apply_births();
        report.compacted = population.maybe_compact(self.compaction_threshold);

        match first_failure {
            Some((agent, source)) => Err(SchedulerError::StepFailed { agent, tick: time.tick(), source }),
            None => Ok(report),
        }
    }

    fn visit_serial<A: Agent>(
        &self,
        population: &Population<A>,
        time:       &SimulationTime,
        stop:       &AtomicBool,
    ) -> Vec<SlotVisit> {
        let mut visits = Vec::with_capacity(population.slot_count());
        for idx in 0..population.slot_count() {
            let visit = population.step_slot(idx, time, stop);
            self.note_failure(&visit, stop);
            visits.push(visit);
        }
        visits
    }

    fn visit_concurrent<A: Agent>(
        &self,
        population: &Population<A>,
        time:       &SimulationTime,
        stop:       &AtomicBool,
    ) -> Vec<SlotVisit> {
        let slots = population.slot_count();
        let chunk = slots.div_ceil(self.workers).max(1);
        thread::scope(|s| {
            let handles: Vec<_> = (0..slots)
                .step_by(chunk)
                .map(|start| {
                    let end = (start + chunk).min(slots);
                    s.spawn(move || {
                        (start..end)
                            .map(|idx| {
                                let visit = population.step_slot(idx, time, stop);
                                self.note_failure(&visit, stop);
                                visit
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(visits) => visits,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }

    fn visit_parallel<A: Agent>(
        &self,
        population: &Population<A>,
        time:       &SimulationTime,
        stop:       &AtomicBool,
    ) -> Vec<SlotVisit> {
        let run = || {
            (0..population.slot_count())
                .into_par_iter()
                .map(|idx| {
                    let visit = population.step_slot(idx, time, stop);
                    self.note_failure(&visit, stop);
                    visit
                })
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    fn note_failure(&self, visit: &SlotVisit, stop: &AtomicBool) {
        if self.stop_on_error && matches!(visit, SlotVisit::Failed(..)) {
            stop.store(true, Ordering::Release);
        }
    }
}
