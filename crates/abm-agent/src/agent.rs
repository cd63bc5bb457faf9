//! The `Agent` trait — the main extension point for per-agent behaviour.

use abm_core::AgentRng;

use crate::{AgentResult, StepContext};

/// One simulated individual.
///
/// The scheduler calls [`step`](Self::step) once per tick while holding the
/// agent's own lock, so `&mut self` is exclusive.  Other agents are reached
/// through the context, never through shared references kept across ticks.
///
/// With the Concurrent and Parallel strategies `step` runs on worker
/// threads, hence `Send`.  Randomness must come from `rng`, which is seeded
/// from the run seed and the agent's id, so every strategy draws the same
/// numbers for the same agent.
///
/// ```rust,ignore
/// struct Walker { x: f64 }
///
/// impl Agent for Walker {
///     fn step(&mut self, ctx: &StepContext<'_, Self>, rng: &mut AgentRng) -> AgentResult<()> {
///         self.x += rng.gen_range(-1.0..1.0);
///         if self.x.abs() > 100.0 {
///             ctx.die();
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Agent: Send + Sized + 'static {
    fn step(&mut self, ctx: &StepContext<'_, Self>, rng: &mut AgentRng) -> AgentResult<()>;

    /// Position reported to `AgentPositions` collectors.  `None` keeps the
    /// agent out of position sets.
    fn position(&self) -> Option<[f64; 2]> {
        None
    }
}
