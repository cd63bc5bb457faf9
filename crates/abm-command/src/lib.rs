//! `abm-command` — the command mailbox between control-plane callers and the
//! engine thread.
//!
//! ```text
//! UI / batch / test threads          engine thread
//!        |                                |
//!        |-- mailbox.send(cmd) ---------> | top of tick:  mailbox.drain(exec)
//!        |   (never waits on execution)   | pause loop:   mailbox.drain(exec)
//!        |                                |
//!                                    manager thread (owns no other work)
//!                                         | loop { mailbox.receive(exec) }
//! ```
//!
//! | Module      | Contents                                                 |
//! |-------------|----------------------------------------------------------|
//! | [`mailbox`] | `Mailbox<C>` — one `Mutex` + `Condvar` guarded FIFO      |
//! | [`manager`] | `CommandManager` — a thread running the blocking loop    |
//! | [`error`]   | `CommandError`, `CommandResult<T>`                       |

pub mod error;
pub mod mailbox;
pub mod manager;


pub use error::{CommandError, CommandResult};
pub use mailbox::Mailbox;
pub use manager::CommandManager;
