use abm_core::{AgentId, Tick};
use thiserror::Error;

/// Failure reported by an agent's `step`, or by population bookkeeping.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent step failed: {0}")]
    Step(String),

    #[error("{0} does not exist")]
    NotFound(AgentId),

    #[error("worker pool error: {0}")]
    Pool(String),
}

impl AgentError {
    pub fn step(reason: impl Into<String>) -> Self {
        AgentError::Step(reason.into())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A step failed while the scheduler was told to stop on the first error.
    #[error("{agent} failed at {tick}: {source}")]
    StepFailed {
        agent:  AgentId,
        tick:   Tick,
        #[source]
        source: AgentError,
    },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
