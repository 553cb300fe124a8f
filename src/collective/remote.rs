//! Collectives for worker processes, served by the launcher's hub

use super::protocol::{read_message_blocking, write_message_blocking, Message, PROTOCOL_VERSION};
use super::{check_root, Collective, CollectiveError, ReduceOp};
use crate::stats::Estimate;
use std::cell::RefCell;
use std::net::TcpStream;

/// Communicator for one worker process
///
/// Holds a blocking connection to the hub. Each collective writes one
/// request and blocks until the hub has heard from every rank.
pub struct RemoteComm {
    rank: usize,
    size: usize,
    stream: RefCell<TcpStream>,
}

impl RemoteComm {
    /// Connect to the hub at `addr` and register as `rank` of `size`
    pub fn connect(addr: &str, rank: usize, size: usize) -> Result<Self, CollectiveError> {
        if size == 0 {
            return Err(CollectiveError::EmptyGroup);
        }
        if rank >= size {
            return Err(CollectiveError::InvalidRank { rank, size });
        }

        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let comm = Self {
            rank,
            size,
            stream: RefCell::new(stream),
        };

        let hello = Message::Hello {
            protocol_version: PROTOCOL_VERSION,
            rank,
            size,
        };
        match comm.exchange(&hello, "hello")? {
            Message::Welcome => Ok(comm),
            other => Err(unexpected("hello", other)),
        }
    }

    /// Close the session, handing the root's estimate to the launcher
    pub fn finish(self, estimate: Option<Estimate>) -> Result<(), CollectiveError> {
        let mut stream = self.stream.into_inner();
        write_message_blocking(&mut stream, &Message::Summary { estimate })
            .map_err(|e| hub_lost("summary", e))
    }

    fn exchange(&self, request: &Message, during: &str) -> Result<Message, CollectiveError> {
        let mut stream = self.stream.borrow_mut();
        write_message_blocking(&mut *stream, request).map_err(|e| hub_lost(during, e))?;
        read_message_blocking(&mut *stream).map_err(|e| hub_lost(during, e))
    }
}

impl Collective for RemoteComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        match self.exchange(&Message::Barrier, "barrier")? {
            Message::Released => Ok(()),
            other => Err(unexpected("barrier", other)),
        }
    }

    fn reduce(
        &self,
        value: f64,
        op: ReduceOp,
        root: usize,
    ) -> Result<Option<f64>, CollectiveError> {
        check_root(root, self.size)?;
        let during = format!("reduce({})", op);
        match self.exchange(&Message::Reduce { op, root, value }, &during)? {
            Message::Reduced { value } => Ok(value),
            other => Err(unexpected(&during, other)),
        }
    }
}

fn hub_lost(during: &str, err: anyhow::Error) -> CollectiveError {
    CollectiveError::Protocol(format!("hub connection lost during {}: {:#}", during, err))
}

fn unexpected(during: &str, reply: Message) -> CollectiveError {
    match reply {
        Message::Abort { reason } => CollectiveError::Aborted(reason),
        other => CollectiveError::Protocol(format!(
            "unexpected {} reply to {}",
            other.kind(),
            during
        )),
    }
}
