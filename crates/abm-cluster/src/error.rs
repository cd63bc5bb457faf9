use std::time::Duration;

use abm_core::Rank;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// A frame arrived for a different collective than the one in progress.
    #[error("desync with {from}: expected {expected} frame, got {got}")]
    Desync {
        from:     Rank,
        expected: &'static str,
        got:      &'static str,
    },

    #[error("no message from {from} within {after:?}")]
    Timeout { from: Rank, after: Duration },

    #[error("{0} has left the cluster")]
    Disconnected(Rank),

    #[error("{0} is outside a cluster of {1}")]
    InvalidRank(Rank, usize),

    #[error("{0} is not the coordinator")]
    NotCoordinator(Rank),

    #[error("the coordinator cannot receive cluster commands")]
    NotPeer,

    #[error("wire codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Raised by a [`ClusterNode`](crate::ClusterNode) hook.
    #[error("node error: {0}")]
    Node(String),
}

impl ClusterError {
    pub fn node(reason: impl Into<String>) -> Self {
        ClusterError::Node(reason.into())
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
