//! `LocalTransport` — a cluster of threads inside one process.
//!
//! Each ordered pair of ranks gets its own unbounded crossbeam channel, so a
//! rank always knows who a frame came from.  Frames carry the collective
//! they belong to; receiving the wrong kind is reported as
//! [`ClusterError::Desync`] instead of silently mixing payloads.

use std::time::Duration;

use abm_core::Rank;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::{ClusterError, ClusterResult, Transport};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Tag {
    Broadcast,
    Scatter,
    Gather,
    Barrier,
    Direct,
}

impl Tag {
    fn as_str(self) -> &'static str {
        match self {
            Tag::Broadcast => "broadcast",
            Tag::Scatter   => "scatter",
            Tag::Gather    => "gather",
            Tag::Barrier   => "barrier",
            Tag::Direct    => "direct",
        }
    }
}

struct Frame {
    tag:     Tag,
    payload: Vec<u8>,
}

pub struct LocalTransport {
    rank:    Rank,
    size:    usize,
    /// `outbox[to]`
    outbox:  Vec<Sender<Frame>>,
    /// `inbox[from]`
    inbox:   Vec<Receiver<Frame>>,
    timeout: Option<Duration>,
}

impl LocalTransport {
    /// One transport per rank, index = rank.  Hand each to its own thread.
    pub fn cluster(size: usize) -> Vec<LocalTransport> {
        let size = size.max(1);
        // channels[from][to]
        let mut senders: Vec<Vec<Option<Sender<Frame>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Frame>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for from in 0..size {
            let mut row = Vec::with_capacity(size);
            for to in 0..size {
                let (tx, rx) = crossbeam_channel::unbounded();
                row.push(Some(tx));
                receivers[to][from] = Some(rx);
            }
            senders.push(row);
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalTransport {
                rank:    Rank(rank as u32),
                size,
                outbox:  outbox.into_iter().flatten().collect(),
                inbox:   inbox.into_iter().flatten().collect(),
                timeout: None,
            })
            .collect()
    }

    /// Fail receives that wait longer than `timeout` instead of blocking
    /// forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn check(&self, rank: Rank) -> ClusterResult<usize> {
        let idx = rank.index();
        if idx < self.size { Ok(idx) } else { Err(ClusterError::InvalidRank(rank, self.size)) }
    }

    fn post(&self, to: Rank, tag: Tag, payload: Vec<u8>) -> ClusterResult<()> {
        let idx = self.check(to)?;
        self.outbox[idx]
            .send(Frame { tag, payload })
            .map_err(|_| ClusterError::Disconnected(to))
    }

    fn take(&self, from: Rank, expected: Tag) -> ClusterResult<Vec<u8>> {
        let idx = self.check(from)?;
        let rx = &self.inbox[idx];
        let frame = match self.timeout {
            None => rx.recv().map_err(|_| ClusterError::Disconnected(from))?,
            Some(after) => rx.recv_timeout(after).map_err(|e| match e {
                RecvTimeoutError::Timeout => ClusterError::Timeout { from, after },
                RecvTimeoutError::Disconnected => ClusterError::Disconnected(from),
            })?,
        };
        if frame.tag != expected {
            return Err(ClusterError::Desync { from, expected: expected.as_str(), got: frame.tag.as_str() });
        }
        Ok(frame.payload)
    }

    fn others(&self) -> impl Iterator<Item = Rank> + '_ {
        (0..self.size as u32).map(Rank).filter(move |&r| r != self.rank)
    }
}

impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, root: Rank, payload: Option<Vec<u8>>) -> ClusterResult<Vec<u8>> {
        self.check(root)?;
        if self.rank != root {
            return self.take(root, Tag::Broadcast);
        }
        let payload = payload.unwrap_or_default();
        for peer in self.others() {
            self.post(peer, Tag::Broadcast, payload.clone())?;
        }
        Ok(payload)
    }

    fn scatter(&self, root: Rank, parts: Option<Vec<Vec<u8>>>) -> ClusterResult<Vec<u8>> {
        self.check(root)?;
        if self.rank != root {
            return self.take(root, Tag::Scatter);
        }
        let mut parts = parts.unwrap_or_default();
        parts.resize(self.size, Vec::new());
        let mut own = Vec::new();
        for (idx, part) in parts.into_iter().enumerate() {
            let to = Rank(idx as u32);
            if to == self.rank {
                own = part;
            } else {
                self.post(to, Tag::Scatter, part)?;
            }
        }
        Ok(own)
    }

    fn gather(&self, root: Rank, payload: Vec<u8>) -> ClusterResult<Option<Vec<Vec<u8>>>> {
        self.check(root)?;
        if self.rank != root {
            self.post(root, Tag::Gather, payload)?;
            return Ok(None);
        }
        let mut all = Vec::with_capacity(self.size);
        let mut own = Some(payload);
        for idx in 0..self.size {
            let from = Rank(idx as u32);
            if from == self.rank {
                all.push(own.take().unwrap_or_default());
            } else {
                all.push(self.take(from, Tag::Gather)?);
            }
        }
        Ok(Some(all))
    }

    /// Arrive at rank 0, then wait for its release.
    fn barrier(&self) -> ClusterResult<()> {
        let root = Rank::COORDINATOR;
        if self.rank != root {
            self.post(root, Tag::Barrier, Vec::new())?;
            self.take(root, Tag::Barrier)?;
            return Ok(());
        }
        for peer in self.others() {
            self.take(peer, Tag::Barrier)?;
        }
        for peer in self.others() {
            self.post(peer, Tag::Barrier, Vec::new())?;
        }
        Ok(())
    }

    fn send(&self, to: Rank, payload: Vec<u8>) -> ClusterResult<()> {
        self.post(to, Tag::Direct, payload)
    }

    fn receive(&self, from: Rank) -> ClusterResult<Vec<u8>> {
        self.take(from, Tag::Direct)
    }
}
