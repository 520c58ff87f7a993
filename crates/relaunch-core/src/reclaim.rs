use crate::config::RelaunchConfig;
use crate::error::RelaunchError;
use crate::process::{
    PortInspector, ProcessHandle, ProcessId, ProcessLauncher, ProcessTerminator, TerminationResult,
};
use crate::sink::LogSink;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a reclaim-and-launch cycle that did launch the server
#[derive(Debug)]
pub struct ReclaimReport<H> {
    /// Port that was reclaimed
    pub port: u16,
    /// Processes found listening on the port
    pub discovered: BTreeSet<ProcessId>,
    /// Processes that are gone after their termination request
    pub terminated: Vec<ProcessId>,
    /// Non-fatal errors absorbed along the way, in the order they happened
    pub failures: Vec<RelaunchError>,
    /// The launched server; never awaited
    pub child: H,
}

impl<H> ReclaimReport<H> {
    /// True when nothing went wrong before the launch
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Free the configured port, then start the server that should own it
///
/// Runs one best-effort cycle:
/// 1. discover the pids listening on the port
/// 2. force kill each one, pausing `settle_delay` after every request
/// 3. optionally poll until the port is released, bounded by `release_timeout`
/// 4. truncate the log file and launch the command with both streams sent to it
///
/// Discovery and termination problems are logged and recorded in the report.
/// Only an invalid configuration or a failed launch is returned as an error.
/// The child is not awaited; this returns as soon as the spawn call does.
pub async fn reclaim_and_launch<R>(
    reclaimer: &R,
    config: &RelaunchConfig,
) -> Result<ReclaimReport<R::Handle>, RelaunchError>
where
    R: PortInspector + ProcessTerminator + ProcessLauncher,
{
    config.validate()?;

    let port = config.port;
    let mut failures = Vec::new();
    let mut terminated = Vec::new();

    let discovered = match reclaimer.listening_pids(port).await {
        Ok(pids) => pids,
        Err(e) => {
            warn!(port = %port, error = %e, "Could not query listening processes, launching anyway");
            failures.push(e);
            BTreeSet::new()
        }
    };

    if discovered.is_empty() {
        debug!(port = %port, "No process listening on port");
    }

    for &pid in &discovered {
        let name = reclaimer.process_name(pid);
        info!(pid = %pid, port = %port, name = ?name, "Killing process on port");

        match reclaimer.force_kill(pid).await {
            TerminationResult::Success => terminated.push(pid),
            TerminationResult::ProcessNotFound => {
                info!(pid = %pid, "Process already exited");
                terminated.push(pid);
            }
            result => {
                let error = RelaunchError::TerminationFailed {
                    pid,
                    reason: result.reason(),
                };
                warn!(pid = %pid, error = %error, "Termination failed, not retrying");
                failures.push(error);
            }
        }

        // The OS needs a moment to release the socket.
        tokio::time::sleep(config.settle_delay()).await;
    }

    if let Some(timeout) = config.release_timeout()
        && !discovered.is_empty()
        && let Err(e) =
            wait_for_release(reclaimer, port, timeout, config.release_poll_interval()).await
    {
        warn!(port = %port, error = %e, "Port not confirmed free, launching anyway");
        failures.push(e);
    }

    let child = launch(reclaimer, config).await?;

    Ok(ReclaimReport {
        port,
        discovered,
        terminated,
        failures,
        child,
    })
}

/// Poll the inspector until nothing listens on `port` or `timeout` elapses
async fn wait_for_release<I>(
    inspector: &I,
    port: u16,
    timeout: Duration,
    interval: Duration,
) -> Result<(), RelaunchError>
where
    I: PortInspector + ?Sized,
{
    let deadline = Instant::now() + timeout;

    loop {
        let pids = inspector.listening_pids(port).await?;
        if pids.is_empty() {
            debug!(port = %port, "Port released");
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(RelaunchError::PortStillHeld {
                port,
                waited_ms: timeout.as_millis() as u64,
                pids,
            });
        }

        tokio::time::sleep(interval).await;
    }
}

async fn launch<L>(launcher: &L, config: &RelaunchConfig) -> Result<L::Handle, RelaunchError>
where
    L: ProcessLauncher + ?Sized,
{
    let launch_failed = |source| RelaunchError::LaunchFailed {
        command: config.display_command(),
        source,
    };

    let sink = LogSink::create(&config.log_path).map_err(launch_failed)?;

    info!(
        command = %config.display_command(),
        working_dir = %config.working_directory.display(),
        log = %sink.path().display(),
        "Starting server"
    );

    let child = launcher
        .launch(
            &config.command,
            &config.args,
            &config.working_directory,
            &config.env,
            sink,
        )
        .await
        .map_err(launch_failed)?;

    info!(pid = ?child.get_pid(), "Server starting");

    Ok(child)
}
