//! Collective hub for worker processes
//!
//! The hub holds one connection per rank. It performs each collective by
//! reading one request from every rank (in rank order), checking that they
//! agree, and answering every rank. Reductions are folded in rank order, so
//! a process run produces the same bits as a thread run of the same size.

use crate::collective::protocol::{read_message, write_message, Message, PROTOCOL_VERSION};
use crate::collective::{CollectiveError, ReduceOp};
use crate::stats::Estimate;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// What a round of requests asks for
#[derive(Debug, Clone, Copy, PartialEq)]
enum Round {
    Barrier,
    Reduce { op: ReduceOp, root: usize },
    Summary,
}

impl Round {
    fn of(msg: &Message) -> Option<Self> {
        match *msg {
            Message::Barrier => Some(Round::Barrier),
            Message::Reduce { op, root, .. } => Some(Round::Reduce { op, root }),
            Message::Summary { .. } => Some(Round::Summary),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Round::Barrier => "barrier".to_string(),
            Round::Reduce { op, root } => format!("reduce({}) to rank {}", op, root),
            Round::Summary => "summary".to_string(),
        }
    }
}

/// Ranks that have completed the hello exchange
///
/// Shared between the hub and the launcher. A rank is marked before its
/// welcome is sent, so a worker that finished its session normally is
/// always marked by the time it exits.
#[derive(Debug, Clone)]
pub struct Registry(Arc<Vec<AtomicBool>>);

impl Registry {
    fn new(size: usize) -> Self {
        Self(Arc::new((0..size).map(|_| AtomicBool::new(false)).collect()))
    }

    fn mark(&self, rank: usize) {
        if let Some(flag) = self.0.get(rank) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// True once `rank` has been welcomed by the hub
    pub fn has_joined(&self, rank: usize) -> bool {
        self.0.get(rank).is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Hub serving one group of worker processes
pub struct Hub {
    listener: TcpListener,
    size: usize,
    registry: Registry,
    debug: bool,
}

impl Hub {
    /// Bind on an ephemeral localhost port for a group of `size` ranks
    pub async fn bind(size: usize, debug: bool) -> Result<Self> {
        if size == 0 {
            return Err(CollectiveError::EmptyGroup.into());
        }
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Failed to bind hub listener")?;
        Ok(Self {
            listener,
            size,
            registry: Registry::new(size),
            debug,
        })
    }

    /// Handle on the set of ranks that have joined
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Address workers connect to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to get hub address")
    }

    /// Serve the whole session and return the root's estimate
    pub async fn run(self) -> Result<Option<Estimate>> {
        let mut peers = self.accept_all().await?;

        if self.debug {
            eprintln!("DEBUG: Hub: all {} workers registered", self.size);
        }

        let mut rounds = 0u64;
        loop {
            let requests = match read_round(&mut peers).await {
                Ok(requests) => requests,
                Err(e) => {
                    abort_all(&mut peers, &format!("{:#}", e)).await;
                    return Err(e);
                }
            };

            let round = match check_round(&requests) {
                Ok(round) => round,
                Err(e) => {
                    abort_all(&mut peers, &e.to_string()).await;
                    return Err(e.into());
                }
            };
            rounds += 1;

            if self.debug {
                eprintln!("DEBUG: Hub: round {} is {}", rounds, round.describe());
            }

            match round {
                Round::Barrier => {
                    for (rank, stream) in peers.iter_mut().enumerate() {
                        write_message(stream, &Message::Released)
                            .await
                            .with_context(|| format!("Failed to release rank {}", rank))?;
                    }
                }
                Round::Reduce { op, root } => {
                    let values = requests.iter().filter_map(|msg| match *msg {
                        Message::Reduce { value, .. } => Some(value),
                        _ => None,
                    });
                    let result = op.fold(values);
                    for (rank, stream) in peers.iter_mut().enumerate() {
                        let value = if rank == root { result } else { None };
                        write_message(stream, &Message::Reduced { value })
                            .await
                            .with_context(|| format!("Failed to send reduction to rank {}", rank))?;
                    }
                }
                Round::Summary => {
                    let estimate = requests.into_iter().find_map(|msg| match msg {
                        Message::Summary { estimate } => estimate,
                        _ => None,
                    });
                    if self.debug {
                        eprintln!("DEBUG: Hub: session closed after {} rounds", rounds);
                    }
                    return Ok(estimate);
                }
            }
        }
    }

    /// Accept connections until every rank has said hello
    ///
    /// Streams are returned indexed by rank.
    async fn accept_all(&self) -> Result<Vec<TcpStream>> {
        let mut slots: Vec<Option<TcpStream>> = (0..self.size).map(|_| None).collect();
        let mut registered = 0;

        while registered < self.size {
            let (mut stream, addr) = self
                .listener
                .accept()
                .await
                .context("Failed to accept worker connection")?;
            stream.set_nodelay(true)?;

            let hello = read_message(&mut stream)
                .await
                .with_context(|| format!("Failed to read hello from {}", addr))?;

            match self.check_hello(&hello, &slots) {
                Ok(rank) => {
                    self.registry.mark(rank);
                    write_message(&mut stream, &Message::Welcome)
                        .await
                        .with_context(|| format!("Failed to welcome rank {}", rank))?;
                    if self.debug {
                        eprintln!("DEBUG: Hub: rank {} connected from {}", rank, addr);
                    }
                    slots[rank] = Some(stream);
                    registered += 1;
                }
                Err(e) => {
                    let reason = e.to_string();
                    let abort = Message::Abort {
                        reason: reason.clone(),
                    };
                    let _ = write_message(&mut stream, &abort).await;
                    let mut peers: Vec<TcpStream> = slots.into_iter().flatten().collect();
                    abort_all(&mut peers, &reason).await;
                    return Err(e.into());
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn check_hello(
        &self,
        hello: &Message,
        slots: &[Option<TcpStream>],
    ) -> Result<usize, CollectiveError> {
        match *hello {
            Message::Hello {
                protocol_version,
                rank,
                size,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(CollectiveError::Protocol(format!(
                        "protocol version mismatch: hub {}, worker {}",
                        PROTOCOL_VERSION, protocol_version
                    )));
                }
                if size != self.size {
                    return Err(CollectiveError::Protocol(format!(
                        "rank {} expects a group of {}, hub serves {}",
                        rank, size, self.size
                    )));
                }
                if rank >= self.size {
                    return Err(CollectiveError::InvalidRank { rank, size });
                }
                if slots[rank].is_some() {
                    return Err(CollectiveError::Protocol(format!("rank {} connected twice", rank)));
                }
                Ok(rank)
            }
            ref other => Err(CollectiveError::Protocol(format!(
                "expected hello, got {}",
                other.kind()
            ))),
        }
    }
}

/// Read one request from every rank, in rank order
async fn read_round(peers: &mut [TcpStream]) -> Result<Vec<Message>> {
    let mut requests = Vec::with_capacity(peers.len());
    for (rank, stream) in peers.iter_mut().enumerate() {
        let msg = read_message(stream).await.map_err(|e| CollectiveError::Disconnected {
            peer: rank,
            during: format!("hub round ({:#})", e),
        })?;
        requests.push(msg);
    }
    Ok(requests)
}

/// Check that every rank asked for the same collective
fn check_round(requests: &[Message]) -> Result<Round, CollectiveError> {
    let first = requests
        .first()
        .ok_or(CollectiveError::EmptyGroup)?;
    let expected = Round::of(first).ok_or_else(|| {
        CollectiveError::Protocol(format!("rank 0 sent {} as a request", first.kind()))
    })?;

    for (rank, msg) in requests.iter().enumerate().skip(1) {
        match Round::of(msg) {
            Some(round) if round == expected => {}
            Some(round) => {
                return Err(CollectiveError::Mismatch {
                    rank,
                    expected: expected.describe(),
                    actual: round.describe(),
                })
            }
            None => {
                return Err(CollectiveError::Protocol(format!(
                    "rank {} sent {} as a request",
                    rank,
                    msg.kind()
                )))
            }
        }
    }

    if let Round::Reduce { root, .. } = expected {
        if root >= requests.len() {
            return Err(CollectiveError::InvalidRoot {
                root,
                size: requests.len(),
            });
        }
    }

    Ok(expected)
}

/// Tell every connected rank the session is over; send errors are ignored
async fn abort_all(peers: &mut [TcpStream], reason: &str) {
    for stream in peers.iter_mut() {
        let _ = write_message(
            stream,
            &Message::Abort {
                reason: reason.to_string(),
            },
        )
        .await;
    }
}
