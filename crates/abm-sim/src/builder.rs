//! Fluent builder for constructing an [`Engine`].

use abm_cluster::{ClusterCoordinator, Transport};
use abm_command::Mailbox;
use abm_core::{RunConfig, SimulationTime};
use abm_data::{DataCollector, DataCollectorDescriptor, DataProcessor, DataSet};

use crate::engine::scheduler_for;
use crate::{Command, Engine, EngineControl, Model, SimResult};

/// Fluent builder for [`Engine<M>`].
///
/// # Required inputs
///
/// - `M: Model`: the model
/// - [`RunConfig`]: length, seed, mode, pacing and hook error policy
///
/// # Optional inputs
///
/// | Method                   | Default                        |
/// |--------------------------|--------------------------------|
/// | `.collector(d)`          | no collectors                  |
/// | `.processor(p)`          | no processors                  |
/// | `.cluster(t)`            | single node                    |
/// | `.mailbox(m)`            | a fresh mailbox                |
///
/// # Example
///
/// ```rust,ignore
/// let (sink, rows) = MemoryProcessor::new();
/// let mut engine = EngineBuilder::new(model, config)
///     .collector(DataCollectorDescriptor::variable("count", 1))
///     .processor(sink)
///     .build()?;
/// let report = engine.run()?;
/// ```
pub struct EngineBuilder<M: Model> {
    model:   M,
    config:  RunConfig,
    data:    DataSet,
    cluster: Option<ClusterCoordinator>,
    mailbox: Option<Mailbox<Command<M>>>,
}

impl<M: Model> EngineBuilder<M> {
    pub fn new(model: M, config: RunConfig) -> Self {
        Self {
            model,
            config,
            data:    DataSet::new(),
            cluster: None,
            mailbox: None,
        }
    }

    /// Register a collector for `(kind, name)` at its interval.  A second
    /// descriptor for the same quantity and interval is ignored.
    pub fn collector(mut self, descriptor: DataCollectorDescriptor) -> Self {
        self.data.add_collector(descriptor);
        self
    }

    pub fn custom_collector(mut self, collector: Box<dyn DataCollector>) -> Self {
        self.data.add_custom_collector(collector);
        self
    }

    pub fn processor<P: DataProcessor + 'static>(mut self, processor: P) -> Self {
        self.data.add_processor(processor);
        self
    }

    pub fn boxed_processor(mut self, processor: Box<dyn DataProcessor>) -> Self {
        self.data.add_boxed_processor(processor);
        self
    }

    /// Join a cluster over `transport`.  Rank 0 coordinates.
    pub fn cluster<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.cluster = Some(ClusterCoordinator::new(transport));
        self
    }

    /// Receive commands from an existing mailbox instead of a fresh one.
    pub fn mailbox(mut self, mailbox: Mailbox<Command<M>>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Validate the configuration and assemble the engine.
    pub fn build(self) -> SimResult<Engine<M>> {
        self.config.validate()?;
        let scheduler = scheduler_for(&self.config)?;
        let control = EngineControl::new(&self.config, self.data);
        Ok(Engine {
            time: SimulationTime::new(self.config.time_step),
            model: self.model,
            control,
            mailbox: self.mailbox.unwrap_or_default(),
            scheduler,
            cluster: self.cluster,
            config: self.config,
        })
    }
}
