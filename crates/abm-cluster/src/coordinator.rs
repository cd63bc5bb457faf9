//! `ClusterCoordinator` — runs cluster commands over a [`Transport`].

use abm_core::Rank;
use tracing::{debug, info};

use crate::{Action, ClusterCommand, ClusterError, ClusterNode, ClusterResult, Role, Transport};

/// What executing one command did on this node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecOutcome {
    /// Labels of the executed actions, in order.
    pub executed:   Vec<String>,
    /// A `Terminate` action was part of the command.
    pub terminated: bool,
}

/// One per node.  Rank 0 drives, every other rank follows.
pub struct ClusterCoordinator {
    transport: Box<dyn Transport>,
    clock:     u64,
}

impl ClusterCoordinator {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self { transport: Box::new(transport), clock: 0 }
    }

    #[inline]
    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.transport.size()
    }

    #[inline]
    pub fn role(&self) -> Role {
        Role::of(self.rank())
    }

    #[inline]
    pub fn is_coordinator(&self) -> bool {
        self.rank().is_coordinator()
    }

    /// Commands executed so far on this node.
    #[inline]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Coordinator only: broadcast `cmd`, then run the coordinator path of
    /// each action in order.
    pub fn broadcast_and_execute(
        &mut self,
        cmd:  &ClusterCommand,
        node: &mut dyn ClusterNode,
    ) -> ClusterResult<ExecOutcome> {
        if !self.is_coordinator() {
            return Err(ClusterError::NotCoordinator(self.rank()));
        }
        self.transport.broadcast(Rank::COORDINATOR, Some(cmd.encode()?))?;
        self.execute(cmd, node)
    }

    /// Peer only: wait for the coordinator's next command and run the peer
    /// path of each action in order.
    pub fn receive_and_execute(&mut self, node: &mut dyn ClusterNode) -> ClusterResult<ExecOutcome> {
        if self.is_coordinator() {
            return Err(ClusterError::NotPeer);
        }
        let bytes = self.transport.broadcast(Rank::COORDINATOR, None)?;
        let cmd = ClusterCommand::decode(&bytes)?;
        self.execute(&cmd, node)
    }

    /// One tick's worth of coordination.  On the coordinator `pending` plus
    /// a barrier is broadcast; peers ignore `pending` and follow.
    pub fn tick(
        &mut self,
        pending: Vec<Action>,
        node:    &mut dyn ClusterNode,
    ) -> ClusterResult<ExecOutcome> {
        if self.is_coordinator() {
            self.broadcast_and_execute(&ClusterCommand::tick(pending), node)
        } else {
            self.receive_and_execute(node)
        }
    }

    /// Coordinator only: tell every peer to end its run.
    pub fn terminate(&mut self, node: &mut dyn ClusterNode) -> ClusterResult<ExecOutcome> {
        info!(size = self.size(), "terminating cluster");
        self.broadcast_and_execute(&ClusterCommand::terminate(), node)
    }

    fn execute(&mut self, cmd: &ClusterCommand, node: &mut dyn ClusterNode) -> ClusterResult<ExecOutcome> {
        let role = self.role();
        let mut outcome = ExecOutcome::default();
        for action in &cmd.actions {
            debug!(rank = self.rank().0, clock = self.clock, action = action.label(), "cluster action");
            match action {
                Action::Barrier => self.transport.barrier()?,
                Action::CollectAgents => self.collect_agents(role, node)?,
                Action::Terminate => outcome.terminated = true,
                Action::Custom { name, payload } => node.on_custom(role, name, payload)?,
            }
            outcome.executed.push(action.label().to_owned());
        }
        self.clock += 1;
        Ok(outcome)
    }

    fn collect_agents(&self, role: Role, node: &mut dyn ClusterNode) -> ClusterResult<()> {
        match role {
            Role::Peer => {
                let payload = node.export_agents()?;
                self.transport.gather(Rank::COORDINATOR, payload)?;
            }
            Role::Coordinator => {
                let parts = self.transport.gather(Rank::COORDINATOR, Vec::new())?.unwrap_or_default();
                for (idx, part) in parts.iter().enumerate() {
                    let from = Rank(idx as u32);
                    if !from.is_coordinator() {
                        node.import_agents(from, part)?;
                    }
                }
            }
        }
        Ok(())
    }
}
