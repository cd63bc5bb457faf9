use abm_agent::{AgentError, SchedulerError};
use abm_cluster::ClusterError;
use abm_command::CommandError;
use abm_core::{CoreError, Tick};
use abm_data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// Raised by model code.
    #[error("model error: {0}")]
    Model(String),

    #[error("no model variable named {0:?}")]
    UnknownVariable(String),

    #[error("no model method named {0:?}")]
    UnknownMethod(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    /// A model hook failed and the hook error policy aborted the run.
    #[error("{hook} hook failed at {tick}: {source}")]
    Hook {
        hook:   &'static str,
        tick:   Tick,
        #[source]
        source: Box<SimError>,
    },

    #[error("failed to spawn the engine thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("data pipeline error: {0}")]
    Data(#[from] DataError),

    #[error("command error: {0}")]
    Command(#[from] CommandError),
}

impl SimError {
    pub fn model(reason: impl Into<String>) -> Self {
        SimError::Model(reason.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
