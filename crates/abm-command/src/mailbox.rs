//! `Mailbox<C>` — a cloneable, thread-safe FIFO of commands.
//!
//! # Locking
//!
//! Every queue mutation happens under one `Mutex`, and one `Condvar` wakes
//! blocked receivers.  Command bodies are always run *after* the guard is
//! dropped, so a slow or re-entrant command (one that sends another command)
//! can never deadlock the queue.
//!
//! # Ordering
//!
//! One queue, one insertion order: commands from a single sender execute in
//! the order they were sent; commands from different senders interleave in
//! global send order.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{CommandError, CommandResult};

struct Queue<C> {
    items:  VecDeque<C>,
    closed: bool,
    sent:   u64,
}

struct Shared<C> {
    queue: Mutex<Queue<C>>,
    ready: Condvar,
}

/// A thread-safe command queue.
///
/// Cloning yields another handle to the same queue; hand clones to every
/// thread that needs to send.
pub struct Mailbox<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for Mailbox<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<C> Default for Mailbox<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Mailbox<C> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue { items: VecDeque::new(), closed: false, sent: 0 }),
                ready: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue<C>> {
        // No user code ever runs under this lock, so a poisoned guard still
        // holds a consistent queue.
        self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Sending ───────────────────────────────────────────────────────────

    /// Enqueue `cmd`.  Returns as soon as it is queued; never waits for
    /// execution.  Fails only once the mailbox has been closed.
    pub fn send(&self, cmd: C) -> CommandResult<()> {
        let mut q = self.lock();
        if q.closed {
            return Err(CommandError::Closed);
        }
        q.items.push_back(cmd);
        q.sent += 1;
        drop(q);
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Close the mailbox: further sends fail, blocked receivers wake up.
    /// Commands already queued can still be received.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Total commands ever accepted by this mailbox.
    pub fn sent_count(&self) -> u64 {
        self.lock().sent
    }

    // ── Blocking discipline ───────────────────────────────────────────────

    /// Park until a command is available, then run `exec` on it outside the
    /// lock.  Returns `false` without calling `exec` once the mailbox is
    /// closed and empty.
    pub fn receive<F: FnOnce(C)>(&self, exec: F) -> bool {
        let mut q = self.lock();
        loop {
            if let Some(cmd) = q.items.pop_front() {
                drop(q);
                exec(cmd);
                return true;
            }
            if q.closed {
                return false;
            }
            q = self.shared.ready.wait(q).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`receive`](Self::receive) but gives up after `timeout`.
    pub fn receive_timeout<F: FnOnce(C)>(&self, timeout: Duration, exec: F) -> bool {
        let deadline = Instant::now() + timeout;
        let mut q = self.lock();
        loop {
            if let Some(cmd) = q.items.pop_front() {
                drop(q);
                exec(cmd);
                return true;
            }
            let now = Instant::now();
            if q.closed || now >= deadline {
                return false;
            }
            q = self
                .shared
                .ready
                .wait_timeout(q, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // ── Non-blocking discipline ───────────────────────────────────────────

    /// Run `exec` on the oldest command if there is one.  Returns `false`
    /// immediately when the queue is empty.
    pub fn try_receive<F: FnOnce(C)>(&self, exec: F) -> bool {
        let cmd = self.lock().items.pop_front();
        match cmd {
            Some(cmd) => {
                exec(cmd);
                true
            }
            None => false,
        }
    }

    /// Take every command queued at the time of the call and run `exec` on
    /// each, in order, outside the lock.  Commands sent while the batch runs
    /// wait for the next drain, so a command that re-sends itself cannot
    /// stall the caller.  Returns the batch size.
    pub fn drain<F: FnMut(C)>(&self, mut exec: F) -> usize {
        let batch = std::mem::take(&mut self.lock().items);
        let n = batch.len();
        for cmd in batch {
            exec(cmd);
        }
        n
    }

    /// Like [`drain`](Self::drain), but `exec` returns `false` to stop early.
    /// The unexecuted rest of the batch goes back to the front of the queue,
    /// ahead of anything sent meanwhile.  Returns how many commands ran.
    pub fn drain_until<F: FnMut(C) -> bool>(&self, mut exec: F) -> usize {
        let mut batch = std::mem::take(&mut self.lock().items);
        let mut ran = 0;
        while let Some(cmd) = batch.pop_front() {
            ran += 1;
            if !exec(cmd) {
                break;
            }
        }
        if !batch.is_empty() {
            let mut q = self.lock();
            batch.append(&mut q.items);
            q.items = batch;
            drop(q);
            self.shared.ready.notify_all();
        }
        ran
    }
}
