use clap::{Parser, ValueEnum};
use relaunch_core::{RelaunchConfig, RelaunchError};
use std::path::PathBuf;

/// Output format of the launcher's own log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Free a TCP port, then start the server that should own it
///
/// Every process listening on the port is force killed, the child's log file is
/// truncated, and the server command is started in the background. The launcher
/// exits right away; it does not supervise the server.
#[derive(Debug, Parser)]
#[command(name = "relaunch", version)]
pub struct Cli {
    /// Port to reclaim
    #[arg(short = 'p', long, env = "RELAUNCH_PORT")]
    pub port: Option<u16>,

    /// Directory the server runs in
    #[arg(short = 'C', long = "cwd", value_name = "DIR")]
    pub working_directory: Option<PathBuf>,

    /// File receiving the server's stdout and stderr
    #[arg(short = 'l', long = "log", value_name = "FILE")]
    pub log_path: Option<PathBuf>,

    /// JSON config file; flags given here override it
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Pause after each termination, in milliseconds
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,

    /// Poll until the port is free, for at most this many milliseconds
    #[arg(long, value_name = "MS")]
    pub release_timeout_ms: Option<u64>,

    /// Extra environment variable for the server (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Format of the launcher's own log output
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Server command and its arguments [default: node app.js]
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Resolve the effective configuration: defaults, then the config file, then flags
    pub fn into_config(self) -> Result<RelaunchConfig, RelaunchError> {
        let mut config = match &self.config {
            Some(path) => RelaunchConfig::from_json_file(path)?,
            None => RelaunchConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.working_directory {
            config.working_directory = dir;
        }
        if let Some(log_path) = self.log_path {
            config.log_path = log_path;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }
        if let Some(timeout) = self.release_timeout_ms {
            config.release_timeout_ms = Some(timeout);
        }

        let mut command = self.command.into_iter();
        if let Some(program) = command.next() {
            config.command = program;
            config.args = command.collect();
        }

        config.env.extend(self.env);

        config.validate()?;
        Ok(config)
    }
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
