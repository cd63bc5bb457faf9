//! `ClusterNode` — what an action needs from the local engine.

use abm_core::Rank;

use crate::ClusterResult;

/// Which code path an action runs on this node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Peer,
}

impl Role {
    pub fn of(rank: Rank) -> Self {
        if rank.is_coordinator() { Role::Coordinator } else { Role::Peer }
    }
}

/// Node-local hooks invoked while a [`ClusterCommand`](crate::ClusterCommand)
/// executes.  Every method has a do-nothing default.
pub trait ClusterNode {
    /// Peer side of `CollectAgents`: serialize the agents this node hands
    /// to the coordinator.
    fn export_agents(&mut self) -> ClusterResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Coordinator side of `CollectAgents`, once per peer, in rank order.
    fn import_agents(&mut self, _from: Rank, _payload: &[u8]) -> ClusterResult<()> {
        Ok(())
    }

    /// Both sides of `Action::Custom`.
    fn on_custom(
        &mut self,
        _role:    Role,
        _name:    &str,
        _payload: &serde_json::Value,
    ) -> ClusterResult<()> {
        Ok(())
    }
}

/// A node with no cluster-visible state.
impl ClusterNode for () {}
