//! The collective-communication contract.

use abm_core::Rank;

use crate::ClusterResult;

/// Blocking message passing between the nodes of one cluster.
///
/// Collectives must be entered by every rank in the same order; a rank
/// that skips or reorders one desynchronizes the cluster.
pub trait Transport: Send {
    fn rank(&self) -> Rank;

    /// Number of ranks, coordinator included.
    fn size(&self) -> usize;

    /// `root` passes `Some(payload)`, the others `None`; every rank returns
    /// the root's payload.
    fn broadcast(&self, root: Rank, payload: Option<Vec<u8>>) -> ClusterResult<Vec<u8>>;

    /// `root` passes one part per rank (its own included); every rank
    /// returns its part.
    fn scatter(&self, root: Rank, parts: Option<Vec<Vec<u8>>>) -> ClusterResult<Vec<u8>>;

    /// Every rank contributes `payload`; `root` returns all of them in rank
    /// order, the others `None`.
    fn gather(&self, root: Rank, payload: Vec<u8>) -> ClusterResult<Option<Vec<Vec<u8>>>>;

    fn barrier(&self) -> ClusterResult<()>;

    fn send(&self, to: Rank, payload: Vec<u8>) -> ClusterResult<()>;

    fn receive(&self, from: Rank) -> ClusterResult<Vec<u8>>;

    fn is_coordinator(&self) -> bool {
        self.rank().is_coordinator()
    }
}
