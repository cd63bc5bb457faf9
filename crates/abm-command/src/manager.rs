//! `CommandManager` — a dedicated thread that owns no work other than
//! executing commands as they arrive.
//!
//! This is the blocking counterpart of the engine's top-of-tick drain: the
//! thread parks on the empty mailbox instead of polling, and exits once the
//! mailbox is closed and fully drained.

use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::{CommandError, CommandResult, Mailbox};

pub struct CommandManager<C: Send + 'static> {
    mailbox: Mailbox<C>,
    handle:  Option<JoinHandle<u64>>,
}

impl<C: Send + 'static> CommandManager<C> {
    /// Spawn a thread named `name` that hands every command received on
    /// `mailbox` to `exec`, in send order.
    pub fn spawn<F>(name: &str, mailbox: Mailbox<C>, mut exec: F) -> CommandResult<Self>
    where
        F: FnMut(C) + Send + 'static,
    {
        let rx = mailbox.clone();
        let thread_name = name.to_owned();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut executed = 0u64;
                while rx.receive(&mut exec) {
                    executed += 1;
                }
                debug!(manager = %thread_name, executed, "command manager stopped");
                executed
            })
            .map_err(|e| CommandError::failed("spawn", e.to_string()))?;
        Ok(Self { mailbox, handle: Some(handle) })
    }

    /// A sender handle for the managed mailbox.
    pub fn mailbox(&self) -> Mailbox<C> {
        self.mailbox.clone()
    }

    /// Close the mailbox, let the thread finish what is queued, and join it.
    /// Returns the number of commands the thread executed.
    pub fn shutdown(mut self) -> CommandResult<u64> {
        self.join()
    }

    fn join(&mut self) -> CommandResult<u64> {
        self.mailbox.close();
        match self.handle.take() {
            Some(h) => h.join().map_err(|_| CommandError::ManagerPanicked),
            None => Ok(0),
        }
    }
}

impl<C: Send + 'static> Drop for CommandManager<C> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}
