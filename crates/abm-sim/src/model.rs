//! The `Model` trait — the main extension point for user code.

use abm_agent::{Agent, Population};
use abm_cluster::{ClusterError, ClusterNode, ClusterResult, Role};
use abm_core::{DataValue, Rank, SimRng, SimulationTime};
use abm_data::{CollectorKind, DataSource};

use crate::{ControlEvent, SimError, SimResult};

/// A simulation model: a population plus the hooks the engine calls around
/// each visitation pass.
///
/// # Required methods
///
/// [`setup`](Self::setup), [`population`](Self::population) and
/// [`population_mut`](Self::population_mut).  Everything else has a
/// default, so a minimal model is a population and a setup routine.
///
/// # Hook order within one tick
///
/// ```text
/// begin → (agents step) → [cluster sync] → update_data_layers → end → row
/// ```
///
/// `begin` and `end` return `Ok(true)` to end the run after this tick.
pub trait Model: Send + 'static {
    type Agent: Agent;

    /// (Re)build the initial state.  Called before every run, after the run
    /// seed has been fixed; `rng` is already seeded.
    fn setup(&mut self, rng: &mut SimRng) -> SimResult<()>;

    fn population(&self) -> &Population<Self::Agent>;

    fn population_mut(&mut self) -> &mut Population<Self::Agent>;

    fn begin(&mut self, _time: &SimulationTime) -> SimResult<bool> {
        Ok(false)
    }

    fn end(&mut self, _time: &SimulationTime) -> SimResult<bool> {
        Ok(false)
    }

    /// Post-processing after the agents stepped, e.g. diffusing a grid.
    fn update_data_layers(&mut self, _time: &SimulationTime) -> SimResult<()> {
        Ok(())
    }

    // ── Data registry ─────────────────────────────────────────────────────

    fn variable(&self, _name: &str) -> Option<DataValue> {
        None
    }

    fn data_layer(&self, _name: &str) -> Option<DataValue> {
        None
    }

    fn inspect_point(&self, _name: &str) -> Option<DataValue> {
        None
    }

    /// Resolve a collector's `(kind, name)`.  By default `AgentPositions`
    /// answers with every living agent's position regardless of `name`.
    fn sample(&self, kind: CollectorKind, name: &str) -> Option<DataValue> {
        match kind {
            CollectorKind::Variable        => self.variable(name),
            CollectorKind::DataLayer       => self.data_layer(name),
            CollectorKind::AgentPositions  => Some(DataValue::Points(self.population().positions())),
            CollectorKind::PointInspection => self.inspect_point(name),
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────

    fn set_variable(&mut self, name: &str, _value: DataValue) -> SimResult<()> {
        Err(SimError::UnknownVariable(name.to_owned()))
    }

    fn invoke_method(&mut self, name: &str) -> SimResult<()> {
        Err(SimError::UnknownMethod(name.to_owned()))
    }

    fn on_control_event(&mut self, _event: &ControlEvent) -> SimResult<()> {
        Ok(())
    }

    // ── Cluster ───────────────────────────────────────────────────────────

    /// Agents this node hands to the coordinator on `CollectAgents`.
    fn export_agents(&mut self) -> SimResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn import_agents(&mut self, _from: Rank, _payload: &[u8]) -> SimResult<()> {
        Ok(())
    }

    fn on_cluster_action(
        &mut self,
        _role:    Role,
        _name:    &str,
        _payload: &serde_json::Value,
    ) -> SimResult<()> {
        Ok(())
    }
}

/// Presents a model to the data pipeline.
pub(crate) struct ModelSource<'a, M>(pub &'a M);

impl<M: Model> DataSource for ModelSource<'_, M> {
    fn sample(&self, kind: CollectorKind, name: &str) -> Option<DataValue> {
        self.0.sample(kind, name)
    }
}

/// Presents a model to the cluster coordinator.
pub(crate) struct ModelNode<'a, M>(pub &'a mut M);

fn node_err(e: SimError) -> ClusterError {
    ClusterError::node(e.to_string())
}

impl<M: Model> ClusterNode for ModelNode<'_, M> {
    fn export_agents(&mut self) -> ClusterResult<Vec<u8>> {
        self.0.export_agents().map_err(node_err)
    }

    fn import_agents(&mut self, from: Rank, payload: &[u8]) -> ClusterResult<()> {
        self.0.import_agents(from, payload).map_err(node_err)
    }

    fn on_custom(&mut self, role: Role, name: &str, payload: &serde_json::Value) -> ClusterResult<()> {
        self.0.on_cluster_action(role, name, payload).map_err(node_err)
    }
}
