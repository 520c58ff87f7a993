//! Parsing for `netstat -ano` and `taskkill` results

use relaunch_core::{ProcessId, TerminationResult};
use std::collections::BTreeSet;

/// taskkill's exit code when no process has the requested PID
const TASKKILL_NOT_FOUND: i32 = 128;

/// Pids of TCP rows listening on exactly `port`
///
/// A row counts as listening when its state column reads `LISTENING` or, on
/// localized systems where that word is translated, when its foreign address
/// has port 0, which only listening sockets have. The local port must match
/// exactly, so port 5000 never matches `:50000`.
pub fn listening_pids(output: &str, port: u16) -> BTreeSet<ProcessId> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [proto, local, foreign, state, pid] = fields.as_slice() else {
                return None;
            };

            if !proto.eq_ignore_ascii_case("TCP") && !proto.eq_ignore_ascii_case("TCPv6") {
                return None;
            }

            let (_, local_port) = local.rsplit_once(':')?;
            if local_port.parse::<u16>().ok()? != port {
                return None;
            }

            let listening = state.eq_ignore_ascii_case("LISTENING")
                || foreign.rsplit_once(':').is_some_and(|(_, p)| p == "0");
            if !listening {
                return None;
            }

            pid.parse::<ProcessId>().ok().filter(|&pid| pid != 0)
        })
        .collect()
}

/// Map a `taskkill` exit code and its stderr to a termination result
pub fn termination_result(exit_code: Option<i32>, stderr: &str) -> TerminationResult {
    match exit_code {
        Some(0) => TerminationResult::Success,
        Some(TASKKILL_NOT_FOUND) => TerminationResult::ProcessNotFound,
        _ if stderr.to_ascii_lowercase().contains("access is denied") => {
            TerminationResult::AccessDenied
        }
        Some(code) => TerminationResult::Failed(format!(
            "taskkill exited with {code}: {}",
            stderr.trim()
        )),
        None => TerminationResult::Failed("taskkill terminated without an exit code".to_string()),
    }
}
