//! Processors — the sinks rows are delivered to.
//!
//! Besides the trait this module ships three general-purpose sinks:
//!
//! - [`MemoryProcessor`] keeps every row in a shared `Vec` (tests, tools).
//! - [`ChannelProcessor`] streams rows to an independent consumer thread.
//! - [`BackgroundProcessor`] moves any processor onto its own thread so a
//!   slow sink never stretches the tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use abm_command::{CommandManager, Mailbox};
use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use crate::{DataError, DataResult, DataRow};

/// A sink bound to the data pipeline.
///
/// `process_data_row` is best-effort: an error is logged by the caller and
/// the processor keeps receiving rows.  `finalize_processing` runs at the
/// end of every run and its error is returned to whoever called `run`.  A
/// bound processor stays bound across runs, so finalizing must leave it
/// ready for the next run's rows.
pub trait DataProcessor: Send {
    /// Name used in log messages.
    fn name(&self) -> &str {
        "processor"
    }

    fn process_data_row(&mut self, row: &Arc<DataRow>) -> DataResult<()>;

    fn finalize_processing(&mut self) -> DataResult<()> {
        Ok(())
    }
}

// ── MemoryProcessor ──────────────────────────────────────────────────────────

/// Appends every row to a shared vector.
pub struct MemoryProcessor {
    rows:      Arc<Mutex<Vec<Arc<DataRow>>>>,
    finalized: Arc<AtomicBool>,
}

/// Read side of a [`MemoryProcessor`]; stays valid after the processor has
/// been moved into the engine.
#[derive(Clone)]
pub struct MemoryHandle {
    rows:      Arc<Mutex<Vec<Arc<DataRow>>>>,
    finalized: Arc<AtomicBool>,
}

impl MemoryProcessor {
    pub fn new() -> (Self, MemoryHandle) {
        let rows = Arc::new(Mutex::new(Vec::new()));
        let finalized = Arc::new(AtomicBool::new(false));
        let handle = MemoryHandle { rows: Arc::clone(&rows), finalized: Arc::clone(&finalized) };
        (Self { rows, finalized }, handle)
    }
}

impl DataProcessor for MemoryProcessor {
    fn name(&self) -> &str {
        "memory"
    }

    fn process_data_row(&mut self, row: &Arc<DataRow>) -> DataResult<()> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(row));
        Ok(())
    }

    fn finalize_processing(&mut self) -> DataResult<()> {
        self.finalized.store(true, Ordering::Release);
        Ok(())
    }
}

impl MemoryHandle {
    /// Copy of every row received so far.
    pub fn rows(&self) -> Vec<Arc<DataRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

// ── ChannelProcessor ─────────────────────────────────────────────────────────

/// Forwards rows over a crossbeam channel.
///
/// The channel stays open across runs.  A run's last row carries
/// `FINAL_STATE`; the consumer's `recv` loop ends once the processor is
/// dropped or unbound and dropped.
pub struct ChannelProcessor {
    name: String,
    tx:   Sender<Arc<DataRow>>,
}

impl ChannelProcessor {
    /// Unbounded channel: the engine never waits on the consumer.
    pub fn unbounded(name: impl Into<String>) -> (Self, Receiver<Arc<DataRow>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { name: name.into(), tx }, rx)
    }

    /// Bounded channel: the engine blocks on a full channel, pacing the run
    /// to the consumer.
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (Self, Receiver<Arc<DataRow>>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { name: name.into(), tx }, rx)
    }
}

impl DataProcessor for ChannelProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_data_row(&mut self, row: &Arc<DataRow>) -> DataResult<()> {
        self.tx.send(Arc::clone(row)).map_err(|_| DataError::Disconnected(self.name.clone()))
    }
}

// ── BackgroundProcessor ──────────────────────────────────────────────────────

enum Job {
    Row(Arc<DataRow>),
    Finalize(Sender<DataResult<()>>),
}

/// Runs an inner processor on a dedicated thread fed through a
/// [`Mailbox`].  Row errors are logged on that thread.  Finalizing waits
/// for the queued rows and the inner finalize, then hands the result back
/// to the engine thread; the worker keeps running for the next run and is
/// shut down when the processor is dropped.
pub struct BackgroundProcessor {
    name:     String,
    mailbox:  Mailbox<Job>,
    _manager: CommandManager<Job>,
}

impl BackgroundProcessor {
    pub fn spawn<P: DataProcessor + 'static>(mut inner: P) -> DataResult<Self> {
        let name = format!("bg:{}", inner.name());
        let mailbox = Mailbox::new();
        let thread_name = name.clone();
        let manager = CommandManager::spawn(&name, mailbox.clone(), move |job| match job {
            Job::Row(row) => {
                if let Err(e) = inner.process_data_row(&row) {
                    warn!(processor = %thread_name, tick = row.tick().0, error = %e, "row delivery failed");
                }
            }
            Job::Finalize(reply) => {
                let _ = reply.send(inner.finalize_processing());
            }
        })?;
        Ok(Self { name, mailbox, _manager: manager })
    }
}

impl DataProcessor for BackgroundProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_data_row(&mut self, row: &Arc<DataRow>) -> DataResult<()> {
        self.mailbox.send(Job::Row(Arc::clone(row)))?;
        Ok(())
    }

    fn finalize_processing(&mut self) -> DataResult<()> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.mailbox.send(Job::Finalize(reply_tx))?;
        reply_rx.recv().map_err(|_| DataError::Disconnected(self.name.clone()))?
    }
}
