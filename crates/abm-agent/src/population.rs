//! `Population<A>` — slot arena of agents with a free list and an id index.
//!
//! # Layout
//!
//! ```text
//! slots:  [ Some(a0) | None | Some(a2) | Some(a5) | None ]   visitation order
//! free:   [ 4, 1 ]                                           reusable slots
//! index:  { a0 → 0, a2 → 2, a5 → 3 }                         AgentId → slot
//! ```
//!
//! A slot whose agent died during a pass becomes a tombstone (`None`) once
//! the pass ends and its index goes on the free list.  Births reuse free
//! slots first.  When tombstones exceed the compaction threshold the arena
//! is rebuilt with only live agents, keeping their relative order.
//!
//! # Locking
//!
//! Each agent sits behind its own `Mutex`, held by the scheduler only while
//! that agent steps.  Liveness is an `AtomicBool` so it can be checked
//! without taking the body lock.  Links live behind a separate lock and no
//! code path ever holds two link locks at once.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use abm_core::{AgentId, AgentRng, SimulationTime};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{Agent, AgentError, StepContext};

// ── AgentCell ─────────────────────────────────────────────────────────────────

pub(crate) struct Body<A> {
    pub agent: A,
    pub rng:   AgentRng,
}

pub(crate) struct AgentCell<A> {
    id:    AgentId,
    alive: AtomicBool,
    links: Mutex<BTreeSet<AgentId>>,
    body:  Mutex<Body<A>>,
}

impl<A> AgentCell<A> {
    fn new(id: AgentId, agent: A, run_seed: u64) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            links: Mutex::new(BTreeSet::new()),
            body:  Mutex::new(Body { agent, rng: AgentRng::new(run_seed, id) }),
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Clear the alive flag.  Returns `true` for the call that actually
    /// killed the agent.
    fn mark_dead(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    fn lock_body(&self) -> MutexGuard<'_, Body<A>> {
        lock(&self.body)
    }

    /// `None` while another thread holds the body (the agent is stepping or
    /// being inspected).
    fn try_lock_body(&self) -> Option<MutexGuard<'_, Body<A>>> {
        match self.body.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn take_links(&self) -> BTreeSet<AgentId> {
        std::mem::take(&mut *lock(&self.links))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of offering one slot to the scheduler.
pub(crate) enum SlotVisit {
    /// Vacant slot, dead agent, or a stop was requested.
    Idle,
    Stepped,
    Failed(AgentId, AgentError),
}

// ── Population ────────────────────────────────────────────────────────────────

/// All agents of one model.
///
/// Mutating methods that take `&self` (`kill`, `link`, …) are safe to call
/// from inside a step; births made during a pass are queued and applied by
/// the scheduler once the pass ends.
pub struct Population<A> {
    slots:    Vec<Option<AgentCell<A>>>,
    free:     Vec<usize>,
    index:    FxHashMap<AgentId, usize>,
    next_id:  AtomicU64,
    live:     AtomicUsize,
    births:   Mutex<Vec<(AgentId, A)>>,
    run_seed: u64,
}

impl<A: Agent> Population<A> {
    pub fn new(run_seed: u64) -> Self {
        Self {
            slots:    Vec::new(),
            free:     Vec::new(),
            index:    FxHashMap::default(),
            next_id:  AtomicU64::new(0),
            live:     AtomicUsize::new(0),
            births:   Mutex::new(Vec::new()),
            run_seed,
        }
    }

    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    /// Adopt a new run seed and re-derive every living agent's RNG from it.
    pub fn reseed(&mut self, run_seed: u64) {
        self.run_seed = run_seed;
        for cell in self.slots.iter().flatten() {
            cell.lock_body().rng = AgentRng::new(run_seed, cell.id);
        }
    }

    // ── Size ──────────────────────────────────────────────────────────────

    /// Living agents.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arena length, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn tombstones(&self) -> usize {
        self.free.len()
    }

    /// Births queued during the current pass.
    pub fn pending_births(&self) -> usize {
        lock(&self.births).len()
    }

    // ── Membership ────────────────────────────────────────────────────────

    /// Add an agent immediately.  Use outside a pass (setup, commands);
    /// inside a step use [`StepContext::spawn`].
    pub fn insert(&mut self, agent: A) -> AgentId {
        let id = self.alloc_id();
        self.place(id, agent);
        id
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.cell(id).is_some_and(AgentCell::is_alive)
    }

    /// Living agents in visitation order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.slots.iter().flatten().filter(|c| c.is_alive()).map(|c| c.id).collect()
    }

    /// Kill `id`, severing its links.  Returns `false` if it was already dead
    /// or never existed.
    pub fn kill(&self, id: AgentId) -> bool {
        match self.cell(id) {
            Some(cell) => self.kill_cell(cell),
            None => false,
        }
    }

    /// Take an agent out of the population entirely, e.g. to hand it to
    /// another node.
    pub fn remove(&mut self, id: AgentId) -> Option<A> {
        let idx = *self.index.get(&id)?;
        let cell = self.slots[idx].take()?;
        if cell.mark_dead() {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
        self.unlink_all(&cell);
        self.index.remove(&id);
        self.free.push(idx);
        Some(cell.body.into_inner().unwrap_or_else(PoisonError::into_inner).agent)
    }

    /// Drop every agent.  Ids already handed out are not reused.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.births.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
        self.live.store(0, Ordering::Release);
    }

    // ── Access ────────────────────────────────────────────────────────────

    /// Read a living agent.  Blocks while that agent is stepping, so do not
    /// call from inside a step (use [`StepContext::with_agent`]).
    pub fn with_agent<R>(&self, id: AgentId, f: impl FnOnce(&A) -> R) -> Option<R> {
        let cell = self.cell(id).filter(|c| c.is_alive())?;
        Some(f(&cell.lock_body().agent))
    }

    pub fn with_agent_mut<R>(&self, id: AgentId, f: impl FnOnce(&mut A) -> R) -> Option<R> {
        let cell = self.cell(id).filter(|c| c.is_alive())?;
        Some(f(&mut cell.lock_body().agent))
    }

    /// Visit every living agent in slot order.
    pub fn for_each(&self, mut f: impl FnMut(AgentId, &A)) {
        for cell in self.slots.iter().flatten().filter(|c| c.is_alive()) {
            f(cell.id, &cell.lock_body().agent);
        }
    }

    /// Positions of every living agent that reports one.
    pub fn positions(&self) -> Vec<[f64; 2]> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|_, a| out.extend(a.position()));
        out
    }

    // ── Links ─────────────────────────────────────────────────────────────

    /// Create a bidirectional link.  Both agents must be alive and distinct.
    /// Returns `false` if the link already existed.
    pub fn link(&self, a: AgentId, b: AgentId) -> bool {
        if a == b {
            return false;
        }
        let (Some(ca), Some(cb)) = (self.cell(a), self.cell(b)) else {
            return false;
        };
        if !ca.is_alive() || !cb.is_alive() {
            return false;
        }
        let added = lock(&ca.links).insert(b);
        lock(&cb.links).insert(a);
        added
    }

    pub fn unlink(&self, a: AgentId, b: AgentId) -> bool {
        let (Some(ca), Some(cb)) = (self.cell(a), self.cell(b)) else {
            return false;
        };
        let removed = lock(&ca.links).remove(&b);
        lock(&cb.links).remove(&a);
        removed
    }

    /// Living link partners of `id`, ascending.
    pub fn links(&self, id: AgentId) -> Vec<AgentId> {
        match self.cell(id) {
            Some(cell) => lock(&cell.links).iter().copied().filter(|&o| self.is_alive(o)).collect(),
            None => Vec::new(),
        }
    }

    // ── Compaction ────────────────────────────────────────────────────────

    /// Compact when the tombstone fraction exceeds `threshold`.  Returns
    /// whether a compaction ran.
    pub fn maybe_compact(&mut self, threshold: f64) -> bool {
        if self.free.is_empty() {
            return false;
        }
        let fraction = self.free.len() as f64 / self.slots.len() as f64;
        if fraction <= threshold {
            return false;
        }
        self.compact();
        true
    }

    /// Rebuild the arena with only live slots, preserving order.
    pub fn compact(&mut self) {
        let before = self.slots.len();
        self.slots.retain(Option::is_some);
        self.free.clear();
        self.index.clear();
        for (i, cell) in self.slots.iter().enumerate() {
            if let Some(cell) = cell {
                self.index.insert(cell.id, i);
            }
        }
        debug!(before, after = self.slots.len(), "population compacted");
    }

    // ── Crate-internal: used by StepContext and Scheduler ─────────────────

    pub(crate) fn cell(&self, id: AgentId) -> Option<&AgentCell<A>> {
        let idx = *self.index.get(&id)?;
        self.slots.get(idx)?.as_ref()
    }

    pub(crate) fn kill_cell(&self, cell: &AgentCell<A>) -> bool {
        if !cell.mark_dead() {
            return false;
        }
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.unlink_all(cell);
        true
    }

    fn unlink_all(&self, cell: &AgentCell<A>) {
        for other in cell.take_links() {
            if let Some(o) = self.cell(other) {
                lock(&o.links).remove(&cell.id);
            }
        }
    }

    fn alloc_id(&self) -> AgentId {
        AgentId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn queue_birth(&self, agent: A) -> AgentId {
        let id = self.alloc_id();
        lock(&self.births).push((id, agent));
        id
    }

    /// Non-blocking access to another agent from inside a step.
    pub(crate) fn try_with<R>(
        &self,
        caller: AgentId,
        id:     AgentId,
        f:      impl FnOnce(&mut A) -> R,
    ) -> Option<R> {
        if caller == id {
            return None;
        }
        let cell = self.cell(id).filter(|c| c.is_alive())?;
        let mut body = cell.try_lock_body()?;
        if !cell.is_alive() {
            return None;
        }
        Some(f(&mut body.agent))
    }

    fn place(&mut self, id: AgentId, agent: A) {
        let cell = AgentCell::new(id, agent, self.run_seed);
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(cell);
                idx
            }
            None => {
                self.slots.push(Some(cell));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, idx);
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    // ── Pass bookkeeping ──────────────────────────────────────────────────

    /// Step the agent in slot `idx` if it is alive and no stop was requested.
    pub(crate) fn step_slot(&self, idx: usize, time: &SimulationTime, stop: &AtomicBool) -> SlotVisit {
        if stop.load(Ordering::Acquire) {
            return SlotVisit::Idle;
        }
        let Some(cell) = self.slots[idx].as_ref().filter(|c| c.is_alive()) else {
            return SlotVisit::Idle;
        };
        let mut body = cell.lock_body();
        // Killed while we waited on another agent's inspection.
        if !cell.is_alive() {
            return SlotVisit::Idle;
        }
        let ctx = StepContext::new(self, cell.id, time);
        let Body { agent, rng } = &mut *body;
        match agent.step(&ctx, rng) {
            Ok(()) => SlotVisit::Stepped,
            Err(e) => SlotVisit::Failed(cell.id, e),
        }
    }

    /// Indices of slots holding a dead agent.
    pub(crate) fn dead_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().filter(|c| !c.is_alive()).map(|_| i))
            .collect()
    }

    /// Same as [`dead_slots`](Self::dead_slots), as a Rayon map over the arena.
    pub(crate) fn par_dead_slots(&self) -> Vec<usize> {
        self.slots
            .par_iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().filter(|c| !c.is_alive()).map(|_| i))
            .collect()
    }

    /// Turn the given slots into tombstones.  Returns how many were reaped.
    pub(crate) fn reap(&mut self, dead: Vec<usize>) -> usize {
        let mut reaped = 0;
        for idx in dead {
            let Some(cell) = self.slots[idx].take() else {
                continue;
            };
            // Links made concurrently with the death may have survived it.
            self.unlink_all(&cell);
            self.index.remove(&cell.id);
            self.free.push(idx);
            reaped += 1;
        }
        reaped
    }

    /// Move queued births into the arena.  Returns how many joined.
    pub(crate) fn apply_births(&mut self) -> usize {
        let births = std::mem::take(self.births.get_mut().unwrap_or_else(PoisonError::into_inner));
        let born = births.len();
        for (id, agent) in births {
            self.place(id, agent);
        }
        born
    }
}
