use crate::error::RelaunchError;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for any single configured pause or wait.
const MAX_DELAY_MS: u64 = 60_000;

/// Configuration for one reclaim-and-launch cycle
///
/// The defaults describe the stock deployment: `node app.js` run from `server/`,
/// logging to `server/server.log`, owning port 5000. Relative paths are resolved
/// against the launcher's own current directory, not the child's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into, strip_option))]
pub struct RelaunchConfig {
    /// TCP port the server must own
    #[serde(default = "default_port")]
    #[builder(default = "default_port()")]
    pub port: u16,

    /// Executable to launch
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments passed to `command`
    ///
    /// Default to `["app.js"]` to pair with the default command; set them
    /// explicitly whenever `command` is overridden.
    #[serde(default = "default_args")]
    #[builder(default = "default_args()")]
    #[builder(setter(custom))]
    pub args: Vec<String>,

    /// Extra environment for the child, layered over the launcher's own
    #[serde(default)]
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,

    /// Directory the child runs in
    #[serde(default = "default_working_directory")]
    #[builder(default = "default_working_directory()")]
    pub working_directory: PathBuf,

    /// File receiving the child's combined stdout and stderr (truncated per run)
    #[serde(default = "default_log_path")]
    #[builder(default = "default_log_path()")]
    pub log_path: PathBuf,

    /// Pause after each termination request (in milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    #[builder(default = "default_settle_delay_ms()")]
    pub settle_delay_ms: u64,

    /// When set, poll until the port is free for at most this long (in milliseconds)
    #[serde(default)]
    #[builder(default)]
    pub release_timeout_ms: Option<u64>,

    /// Interval between release polls (in milliseconds)
    #[serde(default = "default_release_poll_interval_ms")]
    #[builder(default = "default_release_poll_interval_ms()")]
    pub release_poll_interval_ms: u64,
}

impl Default for RelaunchConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            command: default_command(),
            args: default_args(),
            env: HashMap::new(),
            working_directory: default_working_directory(),
            log_path: default_log_path(),
            settle_delay_ms: default_settle_delay_ms(),
            release_timeout_ms: None,
            release_poll_interval_ms: default_release_poll_interval_ms(),
        }
    }
}

impl RelaunchConfig {
    pub fn builder() -> RelaunchConfigBuilder {
        RelaunchConfigBuilder::default()
    }

    /// Parse a JSON config document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, RelaunchError> {
        serde_json::from_str(json)
            .map_err(|e| RelaunchError::ConfigurationError(format!("invalid config: {e}")))
    }

    /// Load a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RelaunchError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelaunchError::ConfigurationError(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), RelaunchError> {
        if self.port == 0 {
            return Err(RelaunchError::ConfigurationError(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        if self.command.trim().is_empty() {
            return Err(RelaunchError::ConfigurationError(
                "command must not be empty".to_string(),
            ));
        }

        if self.settle_delay_ms > MAX_DELAY_MS {
            return Err(RelaunchError::ConfigurationError(
                "settle_delay_ms should not exceed 60 seconds".to_string(),
            ));
        }

        if let Some(timeout) = self.release_timeout_ms {
            if timeout > MAX_DELAY_MS {
                return Err(RelaunchError::ConfigurationError(
                    "release_timeout_ms should not exceed 60 seconds".to_string(),
                ));
            }
            if self.release_poll_interval_ms == 0 {
                return Err(RelaunchError::ConfigurationError(
                    "release_poll_interval_ms must be positive when a release timeout is set"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Get the post-termination pause as Duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Get the bounded release wait, if enabled
    pub fn release_timeout(&self) -> Option<Duration> {
        self.release_timeout_ms.map(Duration::from_millis)
    }

    /// Get the release poll interval as Duration
    pub fn release_poll_interval(&self) -> Duration {
        Duration::from_millis(self.release_poll_interval_ms)
    }

    /// Command line as a single string, for log lines and error messages
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl RelaunchConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// Default value functions for serde
fn default_port() -> u16 {
    5000
}
fn default_command() -> String {
    "node".to_string()
}
fn default_args() -> Vec<String> {
    vec!["app.js".to_string()]
}
fn default_working_directory() -> PathBuf {
    PathBuf::from("server")
}
fn default_log_path() -> PathBuf {
    PathBuf::from("server").join("server.log")
}
fn default_settle_delay_ms() -> u64 {
    1_000
}
fn default_release_poll_interval_ms() -> u64 {
    100
}
