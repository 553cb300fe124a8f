//! In-process collectives for worker threads
//!
//! Each rank gets a `LocalComm` holding one crossbeam channel to and from
//! every other rank. Collectives gather contributions at the root, which
//! combines them in rank order and then releases everyone. Channels are FIFO
//! per pair, so consecutive collectives never mix their values.
//!
//! A rank whose thread exits early drops its channels; peers waiting on it
//! get `CollectiveError::Disconnected` instead of blocking forever.

use super::{check_root, Collective, CollectiveError, ReduceOp};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::cell::Cell;

/// Message exchanged between ranks
#[derive(Debug, Clone, Copy)]
enum Packet {
    /// Contribution to a collective (`op` is `None` for a barrier)
    Contribute {
        seq: u64,
        op: Option<ReduceOp>,
        value: f64,
    },
    /// Root's signal that the collective is complete
    Release { seq: u64 },
}

/// Builder for a group of in-process communicators
pub struct LocalGroup;

impl LocalGroup {
    /// Create `size` connected communicators, index i having rank i
    pub fn new(size: usize) -> Result<Vec<LocalComm>, CollectiveError> {
        if size == 0 {
            return Err(CollectiveError::EmptyGroup);
        }

        // outboxes[src][dst] pairs with inboxes[dst][src]
        let mut outboxes: Vec<Vec<Sender<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<Receiver<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = unbounded();
                outboxes[src].push(tx);
                inboxes[dst].push(rx);
            }
        }

        let comms = outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalComm {
                rank,
                size,
                outbox,
                inbox,
                sequence: Cell::new(0),
            })
            .collect();

        Ok(comms)
    }
}

/// Communicator for one worker thread
///
/// `Send` but not `Sync`: move it into the thread that owns the rank.
pub struct LocalComm {
    rank: usize,
    size: usize,
    /// Channel to each rank, indexed by destination
    outbox: Vec<Sender<Packet>>,
    /// Channel from each rank, indexed by source
    inbox: Vec<Receiver<Packet>>,
    /// Number of collectives issued so far
    sequence: Cell<u64>,
}

impl LocalComm {
    fn next_seq(&self) -> u64 {
        let seq = self.sequence.get();
        self.sequence.set(seq + 1);
        seq
    }

    fn send(&self, dst: usize, packet: Packet, during: &str) -> Result<(), CollectiveError> {
        self.outbox[dst]
            .send(packet)
            .map_err(|_| CollectiveError::Disconnected {
                peer: dst,
                during: during.to_string(),
            })
    }

    fn recv(&self, src: usize, during: &str) -> Result<Packet, CollectiveError> {
        self.inbox[src]
            .recv()
            .map_err(|_| CollectiveError::Disconnected {
                peer: src,
                during: during.to_string(),
            })
    }

    /// Gather one value per rank at `root`, then release every rank
    ///
    /// Returns the rank-ordered values on the root.
    fn gather_and_release(
        &self,
        root: usize,
        op: Option<ReduceOp>,
        value: f64,
    ) -> Result<Option<Vec<f64>>, CollectiveError> {
        let seq = self.next_seq();
        let during = describe(op);

        if self.rank != root {
            self.send(root, Packet::Contribute { seq, op, value }, &during)?;
            return match self.recv(root, &during)? {
                Packet::Release { seq: s } if s == seq => Ok(None),
                other => Err(CollectiveError::Protocol(format!(
                    "rank {} expected release #{} from root {}, got {:?}",
                    self.rank, seq, root, other
                ))),
            };
        }

        let mut values = Vec::with_capacity(self.size);
        for src in 0..self.size {
            if src == self.rank {
                values.push(value);
                continue;
            }
            match self.recv(src, &during)? {
                Packet::Contribute { seq: s, op: o, value: v } if s == seq && o == op => {
                    values.push(v)
                }
                Packet::Contribute { op: o, .. } => {
                    return Err(CollectiveError::Mismatch {
                        rank: src,
                        expected: during,
                        actual: describe(o),
                    })
                }
                other => {
                    return Err(CollectiveError::Protocol(format!(
                        "root {} expected contribution #{} from rank {}, got {:?}",
                        self.rank, seq, src, other
                    )))
                }
            }
        }

        for dst in (0..self.size).filter(|&d| d != self.rank) {
            self.send(dst, Packet::Release { seq }, &during)?;
        }

        Ok(Some(values))
    }
}

impl Collective for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        if self.size == 1 {
            return Ok(());
        }
        self.gather_and_release(0, None, 0.0).map(|_| ())
    }

    fn reduce(
        &self,
        value: f64,
        op: ReduceOp,
        root: usize,
    ) -> Result<Option<f64>, CollectiveError> {
        check_root(root, self.size)?;
        if self.size == 1 {
            return Ok(Some(value));
        }
        let gathered = self.gather_and_release(root, Some(op), value)?;
        Ok(gathered.and_then(|values| op.fold(values)))
    }
}

pub(crate) fn describe(op: Option<ReduceOp>) -> String {
    match op {
        None => "barrier".to_string(),
        Some(op) => format!("reduce({})", op),
    }
}
