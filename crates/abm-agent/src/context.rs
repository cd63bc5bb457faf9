//! `StepContext` — the view an agent gets of the world while it steps.

use abm_core::{AgentId, Rational, SimulationTime, Tick};

use crate::{Agent, Population};

/// Handed to [`Agent::step`].  Cheap to construct; lives only for one step.
///
/// Every method is safe under the Concurrent and Parallel strategies:
/// deaths are visible immediately, births are deferred to the end of the
/// pass, and cross-agent access never blocks.
pub struct StepContext<'a, A: Agent> {
    population: &'a Population<A>,
    me:         AgentId,
    time:       &'a SimulationTime,
}

impl<'a, A: Agent> StepContext<'a, A> {
    pub(crate) fn new(population: &'a Population<A>, me: AgentId, time: &'a SimulationTime) -> Self {
        Self { population, me, time }
    }

    // ── Identity and time ─────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> AgentId {
        self.me
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.time.tick()
    }

    #[inline]
    pub fn model_time(&self) -> Rational {
        self.time.model_time()
    }

    pub fn time(&self) -> &SimulationTime {
        self.time
    }

    /// Living agents, not counting births queued this pass.
    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    // ── Life and death ────────────────────────────────────────────────────

    /// Kill the stepping agent.  Its links are severed now; it is not
    /// stepped again.
    pub fn die(&self) {
        self.population.kill(self.me);
    }

    /// Kill another agent.  If it has not stepped yet this pass, it won't.
    pub fn kill(&self, id: AgentId) -> bool {
        self.population.kill(id)
    }

    /// Queue a new agent.  The id is valid immediately but the agent only
    /// joins (and `is_alive` only reports it) after the current pass.
    pub fn spawn(&self, agent: A) -> AgentId {
        self.population.queue_birth(agent)
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.population.is_alive(id)
    }

    // ── Links ─────────────────────────────────────────────────────────────

    pub fn link(&self, other: AgentId) -> bool {
        self.population.link(self.me, other)
    }

    pub fn unlink(&self, other: AgentId) -> bool {
        self.population.unlink(self.me, other)
    }

    pub fn links(&self) -> Vec<AgentId> {
        self.population.links(self.me)
    }

    // ── Other agents ──────────────────────────────────────────────────────

    /// Run `f` on another agent.
    ///
    /// Returns `None` when the target is missing, dead, the caller itself,
    /// or busy (stepping on another thread or already being inspected).
    /// Never blocks.
    pub fn with_agent<R>(&self, id: AgentId, f: impl FnOnce(&mut A) -> R) -> Option<R> {
        self.population.try_with(self.me, id, f)
    }
}
