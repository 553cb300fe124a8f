//! Worker processes' collectives over a real localhost hub
//!
//! Ranks run as threads with blocking `RemoteComm` clients; the hub runs on
//! its own tokio runtime, as it does inside the process launcher.

use piquad::collective::remote::RemoteComm;
use piquad::collective::{Collective, CollectiveError, ReduceOp};
use piquad::coordinator::hub::Hub;
use piquad::integrate::summation::Summation;
use piquad::integrate::{run_rank, EstimateParams};
use piquad::stats::Estimate;
use piquad::worker::spawn_workers;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

fn start_hub(size: usize) -> (SocketAddr, JoinHandle<anyhow::Result<Option<Estimate>>>) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let hub = runtime.block_on(Hub::bind(size, false)).unwrap();
    let addr = hub.local_addr().unwrap();
    let handle = thread::spawn(move || runtime.block_on(hub.run()));
    (addr, handle)
}

fn run_remote(size: usize, params: EstimateParams) -> (Vec<f64>, Option<Estimate>) {
    let (addr, hub) = start_hub(size);
    let addr = addr.to_string();

    let handles: Vec<_> = (0..size)
        .map(|rank| {
            let addr = addr.clone();
            thread::spawn(move || {
                let comm = RemoteComm::connect(&addr, rank, size).unwrap();
                let outcome = run_rank(&comm, &params).unwrap();
                comm.finish(outcome.estimate.clone()).unwrap();
                outcome
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let from_hub = hub.join().unwrap().unwrap();

    let root = outcomes.iter().find_map(|o| o.estimate.clone());
    assert_eq!(root, from_hub);
    (outcomes.iter().map(|o| o.local).collect(), from_hub)
}

#[test]
fn test_hub_estimate_matches_threads_bitwise() {
    for size in [1usize, 2, 3, 5] {
        let params = EstimateParams::new(60_001, Summation::Exact).unwrap();
        let (_, remote) = run_remote(size, params);
        let remote = remote.expect("root sends its estimate");
        let local = spawn_workers(params, size, false).unwrap().estimate;

        assert_eq!(remote.workers, size);
        assert_eq!(remote.pi.to_bits(), local.pi.to_bits(), "size={}", size);
        assert!(remote.abs_error < 1e-9);
    }
}

#[test]
fn test_hub_folds_in_rank_order() {
    let params = EstimateParams::new(10_000, Summation::Naive).unwrap();
    let (locals, estimate) = run_remote(4, params);
    let folded = locals.iter().fold(0.0, |a, b| a + b);
    assert_eq!(estimate.unwrap().pi.to_bits(), folded.to_bits());
}

#[test]
fn test_reduce_to_non_zero_root() {
    let (addr, hub) = start_hub(3);
    let addr = addr.to_string();

    let handles: Vec<_> = (0..3)
        .map(|rank| {
            let addr = addr.clone();
            thread::spawn(move || {
                let comm = RemoteComm::connect(&addr, rank, 3).unwrap();
                comm.barrier().unwrap();
                let max = comm.reduce(rank as f64 * 10.0, ReduceOp::Max, 2).unwrap();
                let min = comm.reduce(rank as f64 - 1.0, ReduceOp::Min, 1).unwrap();
                comm.finish(None).unwrap();
                (max, min)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], (None, None));
    assert_eq!(results[1], (None, Some(-1.0)));
    assert_eq!(results[2], (Some(20.0), None));
    assert_eq!(hub.join().unwrap().unwrap(), None);
}

#[test]
fn test_mismatched_collectives_abort_everyone() {
    let (addr, hub) = start_hub(2);
    let addr = addr.to_string();

    let a = {
        let addr = addr.clone();
        thread::spawn(move || RemoteComm::connect(&addr, 0, 2).unwrap().barrier())
    };
    let b = thread::spawn(move || {
        RemoteComm::connect(&addr, 1, 2)
            .unwrap()
            .reduce(1.0, ReduceOp::Sum, 0)
    });

    assert!(matches!(a.join().unwrap(), Err(CollectiveError::Aborted(_))));
    assert!(matches!(b.join().unwrap(), Err(CollectiveError::Aborted(_))));

    let err = hub.join().unwrap().unwrap_err();
    assert!(err.to_string().contains("different collectives"), "{}", err);
}

#[test]
fn test_lost_worker_aborts_the_rest() {
    let (addr, hub) = start_hub(2);
    let addr = addr.to_string();

    let survivor = {
        let addr = addr.clone();
        thread::spawn(move || RemoteComm::connect(&addr, 0, 2).unwrap().barrier())
    };
    // Rank 1 registers, then goes away without a collective
    let quitter = RemoteComm::connect(&addr, 1, 2).unwrap();
    drop(quitter);

    assert!(matches!(survivor.join().unwrap(), Err(CollectiveError::Aborted(_))));
    assert!(hub.join().unwrap().is_err());
}

#[test]
fn test_duplicate_rank_rejected() {
    let (addr, hub) = start_hub(2);
    let addr = addr.to_string();

    let first = RemoteComm::connect(&addr, 0, 2).unwrap();
    let second = RemoteComm::connect(&addr, 0, 2);
    assert!(matches!(second, Err(CollectiveError::Aborted(_))));

    // The session is over for the first rank too
    assert!(first.barrier().is_err());
    assert!(hub.join().unwrap().is_err());
}

#[test]
fn test_wrong_group_size_rejected() {
    let (addr, hub) = start_hub(2);
    let result = RemoteComm::connect(&addr.to_string(), 0, 3);
    assert!(matches!(result, Err(CollectiveError::Aborted(_))));
    assert!(hub.join().unwrap().is_err());
}
