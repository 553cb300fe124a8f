//! Process launcher
//!
//! Runs an estimate with one OS process per worker. The launcher binds a
//! hub on localhost, starts W copies of this binary in worker mode, and
//! serves their collectives until the root hands back its estimate.
//!
//! Worker processes inherit stdout and stderr: rank 0 prints its own result
//! line, and `--debug` output from every rank lands on the launcher's stderr.

pub mod hub;

use crate::config::cli_convert::summation_flag;
use crate::config::OutputFormat;
use crate::integrate::EstimateParams;
use crate::stats::Estimate;
use crate::Result;
use anyhow::Context;
use hub::{Hub, Registry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// How often running workers are checked for an early exit
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period before a surviving worker is killed after a failure
const CHILD_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Launches worker processes and serves them through a hub
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    format: OutputFormat,
    debug: bool,
}

impl ProcessLauncher {
    /// Launcher that re-executes the running binary
    pub fn current_exe(format: OutputFormat, debug: bool) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to get current executable path")?;
        Ok(Self::with_program(program, format, debug))
    }

    /// Launcher for an explicit worker binary
    pub fn with_program(program: impl Into<PathBuf>, format: OutputFormat, debug: bool) -> Self {
        Self {
            program: program.into(),
            format,
            debug,
        }
    }

    /// Run `workers` worker processes to completion and return the root's estimate
    pub fn run(&self, params: &EstimateParams, workers: usize) -> Result<Estimate> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

        runtime.block_on(async {
            let hub = Hub::bind(workers, self.debug).await?;
            let addr = hub.local_addr()?;
            if self.debug {
                eprintln!("DEBUG: Hub listening on {}", addr);
            }

            let registry = hub.registry();
            let mut children = self.spawn_children(params, workers, &addr)?;

            let result = tokio::select! {
                result = hub.run() => result,
                failure = watch_children(&mut children, &registry) => Err(failure),
            };

            match result {
                Ok(estimate) => {
                    wait_children(children, self.debug)?;
                    estimate.context("Root worker sent no estimate")
                }
                Err(e) => {
                    cleanup_children(children, self.debug);
                    Err(e)
                }
            }
        })
    }

    /// Command line for one worker process
    pub fn command(
        &self,
        params: &EstimateParams,
        rank: usize,
        size: usize,
        hub: &SocketAddr,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--mode").arg("worker");
        cmd.arg("--rank").arg(rank.to_string());
        cmd.arg("--size").arg(size.to_string());
        cmd.arg("--hub").arg(hub.to_string());
        cmd.arg("--intervals").arg(params.intervals().to_string());
        cmd.arg("--summation").arg(summation_flag(params.summation()));
        cmd.arg("--format").arg(self.format.to_string());

        if self.debug {
            cmd.arg("--debug");
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        cmd
    }

    fn spawn_children(
        &self,
        params: &EstimateParams,
        size: usize,
        hub: &SocketAddr,
    ) -> Result<Vec<Child>> {
        let mut children = Vec::with_capacity(size);
        for rank in 0..size {
            match self.command(params, rank, size, hub).spawn() {
                Ok(child) => {
                    if self.debug {
                        eprintln!("DEBUG: Worker {} launched (PID: {})", rank, child.id());
                    }
                    children.push(child);
                }
                Err(e) => {
                    cleanup_children(children, self.debug);
                    return Err(e).with_context(|| {
                        format!(
                            "Failed to spawn worker process {} ({})",
                            rank,
                            self.program.display()
                        )
                    });
                }
            }
        }
        Ok(children)
    }
}

/// Run an estimate with worker processes of the running binary
pub fn launch(
    params: &EstimateParams,
    workers: usize,
    format: OutputFormat,
    debug: bool,
) -> Result<Estimate> {
    ProcessLauncher::current_exe(format, debug)?.run(params, workers)
}

/// Resolve once any worker exits in a way the hub cannot see
///
/// A failed exit is reported at once. A clean exit is only an error for a
/// rank the hub never welcomed; a joined rank's exit reaches the hub as
/// its summary or as a closed connection.
async fn watch_children(children: &mut [Child], registry: &Registry) -> anyhow::Error {
    loop {
        for (rank, child) in children.iter_mut().enumerate() {
            match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    return anyhow::anyhow!("Worker process {} exited with {}", rank, status);
                }
                Ok(Some(status)) if !registry.has_joined(rank) => {
                    return anyhow::anyhow!(
                        "Worker process {} exited with {} before joining the hub",
                        rank,
                        status
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    return anyhow::Error::new(e)
                        .context(format!("Failed to poll worker process {}", rank));
                }
            }
        }
        tokio::time::sleep(CHILD_POLL_INTERVAL).await;
    }
}

/// Wait for every worker after a completed session
fn wait_children(children: Vec<Child>, debug: bool) -> Result<()> {
    for (rank, mut child) in children.into_iter().enumerate() {
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for worker process {}", rank))?;
        if debug {
            eprintln!("DEBUG: Worker {} exited with status: {}", rank, status);
        }
        if !status.success() {
            anyhow::bail!("Worker process {} exited with {}", rank, status);
        }
    }
    Ok(())
}

/// Stop workers left running after a failure
fn cleanup_children(children: Vec<Child>, debug: bool) {
    let mut waited = false;
    for (rank, mut child) in children.into_iter().enumerate() {
        match child.try_wait() {
            Ok(Some(status)) => {
                if debug {
                    eprintln!("DEBUG: Worker {} already exited with status: {}", rank, status);
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("Warning: Failed to poll worker process {}: {}", rank, e);
            }
        }

        // Workers that got an abort exit on their own; give them a moment once
        if !waited {
            std::thread::sleep(CHILD_GRACE_PERIOD);
            waited = true;
        }
        if let Ok(Some(_)) = child.try_wait() {
            continue;
        }

        if debug {
            eprintln!("DEBUG: Worker {} still running, killing (PID: {})", rank, child.id());
        }
        if let Err(e) = child.kill() {
            eprintln!("Warning: Failed to kill worker process {}: {}", rank, e);
        }
        let _ = child.wait();
    }
}
