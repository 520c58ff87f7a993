use crate::process::ProcessId;
use std::collections::BTreeSet;
use thiserror::Error;

/// Error types for a reclaim-and-launch cycle
///
/// Only [`RelaunchError::LaunchFailed`] and [`RelaunchError::ConfigurationError`]
/// end the cycle. The others are absorbed, logged, and collected in the
/// [`ReclaimReport`](crate::ReclaimReport).
#[derive(Error, Debug)]
pub enum RelaunchError {
    #[error("Listening-process discovery unavailable for port {port}: {reason}")]
    DiscoveryUnavailable { port: u16, reason: String },

    #[error("Failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: ProcessId, reason: String },

    #[error("Port {port} still held by {pids:?} after waiting {waited_ms}ms")]
    PortStillHeld {
        port: u16,
        waited_ms: u64,
        pids: BTreeSet<ProcessId>,
    },

    #[error("Failed to launch `{command}`: {source}")]
    LaunchFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl RelaunchError {
    /// Check if this error means the server was not (re)started
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelaunchError::LaunchFailed { .. } | RelaunchError::ConfigurationError(_)
        )
    }
}
