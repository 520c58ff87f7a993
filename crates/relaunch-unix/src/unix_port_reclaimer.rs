#[cfg(unix)]
mod unix_impl {
    use crate::socket_table;
    use async_trait::async_trait;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
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

    /// Unix-specific handle to a launched server
    #[derive(Debug)]
    pub struct UnixProcessHandle {
        child: Child,
        command: String,
        args: Vec<String>,
    }

    impl UnixProcessHandle {
        pub fn new(child: Child, command: String, args: Vec<String>) -> Self {
            Self {
                child,
                command,
                args,
            }
        }

        /// Wait for the process to exit
        ///
        /// The reclaim cycle never calls this; it exists for callers that do want
        /// to follow the child.
        pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
            self.child.wait().await
        }
    }

    #[async_trait]
    impl ProcessHandle for UnixProcessHandle {
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
                warn!("Unix process handle has no PID - process may have exited");
                return false;
            };

            // Signal 0 only checks that the process exists.
            signal::kill(NixPid::from_raw(pid as i32), None).is_ok()
        }
    }

    /// Unix port reclaimer: socket-table discovery, SIGKILL, detached spawn
    pub struct UnixPortReclaimer {
        system: std::sync::Mutex<System>,
    }

    impl Default for UnixPortReclaimer {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PortInspector for UnixPortReclaimer {
        async fn listening_pids(&self, port: u16) -> Result<BTreeSet<ProcessId>, RelaunchError> {
            #[cfg(target_os = "linux")]
            let found = socket_table::listening_pids_procfs(port);

            #[cfg(not(target_os = "linux"))]
            let found = socket_table::listening_pids_lsof(port).await;

            found.map_err(|e| RelaunchError::DiscoveryUnavailable {
                port,
                reason: format!("{e:#}"),
            })
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
    impl ProcessTerminator for UnixPortReclaimer {
        async fn force_kill(&self, pid: ProcessId) -> TerminationResult {
            // 0 and negative values address process groups, never a single pid.
            let raw = match i32::try_from(pid) {
                Ok(raw) if raw > 0 => raw,
                _ => return TerminationResult::Failed(format!("invalid pid {pid}")),
            };

            match signal::kill(NixPid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) => {
                    info!(pid = %pid, "Sent SIGKILL to process");
                    TerminationResult::Success
                }
                Err(nix::errno::Errno::ESRCH) => {
                    info!(pid = %pid, "Process not found (already terminated)");
                    TerminationResult::ProcessNotFound
                }
                Err(nix::errno::Errno::EPERM) => {
                    warn!(pid = %pid, "Permission denied to kill process");
                    TerminationResult::AccessDenied
                }
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to send SIGKILL to process");
                    TerminationResult::Failed(format!("SIGKILL failed: {e}"))
                }
            }
        }
    }

    #[async_trait]
    impl ProcessLauncher for UnixPortReclaimer {
        type Handle = UnixProcessHandle;

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

            // Own process group: a Ctrl-C aimed at the launcher must not reach the server.
            cmd.process_group(0);

            let child = cmd.spawn()?;

            if let Some(pid) = child.id() {
                info!(pid = %pid, command = %command, args = ?args, "Spawned Unix process");
            }

            Ok(UnixProcessHandle::new(
                child,
                command.to_string(),
                args.to_vec(),
            ))
        }
    }

    impl PortReclaimer for UnixPortReclaimer {
        fn new() -> Self {
            info!("Initializing Unix port reclaimer");
            Self {
                system: std::sync::Mutex::new(System::new()),
            }
        }
    }
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::{UnixPortReclaimer, UnixProcessHandle};
