use crate::error::RelaunchError;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Unique identifier for a process
pub type ProcessId = u32;

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Access denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

impl TerminationResult {
    /// Whether the process is gone after this result
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            TerminationResult::Success | TerminationResult::ProcessNotFound
        )
    }

    /// Human-readable reason for a failed termination
    pub fn reason(&self) -> String {
        match self {
            TerminationResult::Success => "terminated".to_string(),
            TerminationResult::ProcessNotFound => "process not found".to_string(),
            TerminationResult::AccessDenied => "access denied".to_string(),
            TerminationResult::Failed(msg) => msg.clone(),
        }
    }
}

/// Handle to a launched server process
///
/// The launcher hands this back for reporting only. Dropping it leaves the
/// process running.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if the process already exited)
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn get_command(&self) -> &str;

    /// Get the arguments passed to this process
    fn get_args(&self) -> &[String];

    /// Check if the process is still running (non-blocking)
    async fn is_running(&self) -> bool;
}

/// Finds the processes that own a listening TCP socket on a port
#[async_trait]
pub trait PortInspector: Send + Sync {
    /// List the process identifiers currently listening on `port`
    ///
    /// An empty set is the normal answer for a free port. An error means the
    /// platform query itself could not run.
    async fn listening_pids(&self, port: u16) -> Result<BTreeSet<ProcessId>, RelaunchError>;

    /// Best-effort executable name for log lines
    fn process_name(&self, _pid: ProcessId) -> Option<String> {
        None
    }
}

/// Forcefully terminates processes by identifier
#[async_trait]
pub trait ProcessTerminator: Send + Sync {
    /// Force kill a single process (SIGKILL on Unix, `taskkill /F` on Windows)
    async fn force_kill(&self, pid: ProcessId) -> TerminationResult;
}

/// Starts a detached server process with its output sent to a log file
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// The type of process handle this launcher produces
    type Handle: ProcessHandle;

    /// Spawn `command` in `working_dir` without waiting for it
    ///
    /// Both standard streams of the child go to `sink`. The returned handle must
    /// not kill the child when dropped.
    async fn launch(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &HashMap<String, String>,
        sink: LogSink,
    ) -> std::io::Result<Self::Handle>;
}

/// Everything a platform needs to reclaim a port and relaunch its server
pub trait PortReclaimer: PortInspector + ProcessTerminator + ProcessLauncher {
    /// Create a new reclaimer instance
    fn new() -> Self
    where
        Self: Sized;
}

/// Factory trait for creating platform-specific port reclaimers
pub trait PortReclaimerFactory {
    /// The type of reclaimer this factory creates
    type Reclaimer: PortReclaimer;

    /// Create a reclaimer for the current platform
    fn create_port_reclaimer() -> Self::Reclaimer;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
