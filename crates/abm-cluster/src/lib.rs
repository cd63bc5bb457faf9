//! `abm-cluster` — keeps several engine instances in lock-step.
//!
//! Every tick the coordinator (rank 0) broadcasts one [`ClusterCommand`]:
//! the actions it queued during the tick followed by a barrier.  Peers
//! receive it and run the same actions in the same order, each action
//! taking its coordinator path on rank 0 and its peer path elsewhere.
//!
//! ```text
//!  rank 0                         rank 1..n
//!  broadcast_and_execute(cmd) ──► receive_and_execute()
//!    for a in cmd: a.coordinator    for a in cmd: a.peer
//!  clock += 1                     clock += 1
//! ```
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`action`]      | `Action`, `ClusterCommand` and their JSON wire form       |
//! | [`transport`]   | `Transport` — the collective-communication contract       |
//! | [`local`]       | `LocalTransport` — in-process transport over channels     |
//! | [`node`]        | `ClusterNode` — node-local hooks actions call into        |
//! | [`coordinator`] | `ClusterCoordinator`, `ExecOutcome`                       |
//! | [`error`]       | `ClusterError`, `ClusterResult<T>`                        |

pub mod action;
pub mod coordinator;
pub mod error;
pub mod local;
pub mod node;
pub mod transport;


pub use action::{Action, ClusterCommand};
pub use coordinator::{ClusterCoordinator, ExecOutcome};
pub use error::{ClusterError, ClusterResult};
pub use local::LocalTransport;
pub use node::{ClusterNode, Role};
pub use transport::Transport;
