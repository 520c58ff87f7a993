use crate::netstat;
use anyhow::{Context, Result};
use async_trait::async_trait;
use relaunch_core::{
    LogSink, PortInspector, PortReclaimer, ProcessHandle, ProcessId, ProcessLauncher,
    ProcessTerminator, RelaunchError, TerminationResult,
};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::{Child, Command};
use tracing::{info, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Windows-specific handle to a launched server
#[derive(Debug)]
pub struct WindowsProcessHandle {
    child: Child,
    command: String,
    args: Vec<String>,
}

impl WindowsProcessHandle {
    pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
        Self {
            child,
            command,
            args,
        }
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }
}

#[async_trait]
impl ProcessHandle for WindowsProcessHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.child.id()
    }

    fn get_command(&self) -> &str {
        &self.command
    }

    fn get_args(&self) -> &[String] {
        &self.args
    }

    async fn is_running(&self) -> bool {
        let Some(pid) = self.get_pid() else {
            warn!("Windows process handle has no PID - process may have exited");
            return false;
        };

        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).is_some()
    }
}

/// Windows port reclaimer: netstat discovery, taskkill, console-less spawn
pub struct WindowsPortReclaimer {
    system: std::sync::Mutex<System>,
}

impl Default for WindowsPortReclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsPortReclaimer {
    async fn netstat(&self) -> Result<String> {
        let output = Command::new("netstat")
            .arg("-ano")
            .output()
            .await
            .context("failed to run netstat")?;

        if !output.status.success() {
            anyhow::bail!(
                "netstat exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Use taskkill /F to terminate a single process
    async fn taskkill(&self, pid: ProcessId) -> Result<TerminationResult> {
        let output = Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .await
            .context("failed to run taskkill")?;

        Ok(netstat::termination_result(
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

#[async_trait]
impl PortInspector for WindowsPortReclaimer {
    async fn listening_pids(&self, port: u16) -> Result<BTreeSet<ProcessId>, RelaunchError> {
        let output = self
            .netstat()
            .await
            .map_err(|e| RelaunchError::DiscoveryUnavailable {
                port,
                reason: format!("{e:#}"),
            })?;

        Ok(netstat::listening_pids(&output, port))
    }

    fn process_name(&self, pid: ProcessId) -> Option<String> {
        let mut system = self.system.lock().ok()?;
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
    }
}

#[async_trait]
impl ProcessTerminator for WindowsPortReclaimer {
    async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
        match self.taskkill(pid).await {
            Ok(TerminationResult::Success) => {
                info!(pid = %pid, "Force killed process");
                TerminationResult::Success
            }
            Ok(result) => {
                warn!(pid = %pid, result = ?result, "taskkill did not kill process");
                result
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to force kill process");
                TerminationResult::Failed(format!("Force kill failed: {e:#}"))
            }
        }
    }
}

#[async_trait]
impl ProcessLauncher for WindowsPortReclaimer {
    type Handle = WindowsProcessHandle;

    async fn launch(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: &HashMap<String, String>,
        sink: LogSink,
    ) -> std::io::Result<Self::Handle> {
        if !working_dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("working directory {} does not exist", working_dir.display()),
            ));
        }

        let (stdout, stderr) = sink.into_stdio()?;

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(working_dir)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        // No console window, and out of reach of the launcher's Ctrl-C.
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);

        let child = cmd.spawn()?;

        if let Some(pid) = child.id() {
            info!(
                pid = %pid,
                command = %command,
                args = ?args,
                "Spawned Windows process"
            );
        }

        Ok(WindowsProcessHandle::new(
            child,
            command.to_string(),
            args.to_vec(),
        ))
    }
}

impl PortReclaimer for WindowsPortReclaimer {
    fn new() -> Self {
        info!("Initializing Windows port reclaimer");
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }
}
