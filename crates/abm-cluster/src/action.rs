//! Cluster actions and the command that carries them.

use serde::{Deserialize, Serialize};

use crate::ClusterResult;

/// One step of a [`ClusterCommand`].
///
/// Wire form is an internally tagged JSON object:
///
/// ```json
/// {"action":"barrier"}
/// {"action":"custom","name":"rebalance","payload":{"cells":[3,4]}}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Every node blocks until all nodes reach it.
    Barrier,
    /// Peers hand their exported agents to the coordinator.
    CollectAgents,
    /// Every node ends its run after this command.
    Terminate,
    /// Application-defined action dispatched to `ClusterNode::on_custom`.
    Custom {
        name:    String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl Action {
    pub fn custom(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Action::Custom { name: name.into(), payload }
    }

    /// Short name for logs and execution traces.
    pub fn label(&self) -> &str {
        match self {
            Action::Barrier          => "barrier",
            Action::CollectAgents    => "collect_agents",
            Action::Terminate        => "terminate",
            Action::Custom { name, .. } => name,
        }
    }
}

/// Ordered action list executed identically by every node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterCommand {
    pub actions: Vec<Action>,
}

impl ClusterCommand {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// The per-tick command: `pending` followed by a barrier.
    pub fn tick(pending: Vec<Action>) -> Self {
        let mut actions = pending;
        actions.push(Action::Barrier);
        Self { actions }
    }

    pub fn terminate() -> Self {
        Self { actions: vec![Action::Terminate] }
    }

    pub fn is_terminate(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, Action::Terminate))
    }

    pub fn encode(&self) -> ClusterResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> ClusterResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
