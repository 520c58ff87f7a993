//! Listening-socket discovery
//!
//! Linux reads the kernel socket tables under `/proc/net` and maps socket
//! inodes back to pids through `/proc/<pid>/fd`. Other Unix systems ask `lsof`.
//! The parsers are plain functions so they can be exercised on any host.

use relaunch_core::ProcessId;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub type Ino = u64;

/// TCP_LISTEN in the `st` column of /proc/net/tcp{,6}
const TCP_LISTEN: u8 = 0x0A;

/// Split one socket table row into (local port, state, inode)
fn parse_socket_line(line: &str) -> Option<(u16, u8, Ino)> {
    let mut iter = line.split_whitespace();
    let local_address = iter.nth(1)?; // field 1: local address
    let state = iter.nth(1)?; // field 3: state (skip field 2)
    let inode = iter.nth(5)?; // field 9: inode (skip fields 4-8)

    let (_, port) = local_address.rsplit_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let state = u8::from_str_radix(state, 16).ok()?;
    let inode = inode.parse().ok()?;

    Some((port, state, inode))
}

/// Inodes of the sockets listening on `port` in one socket table dump
pub fn listening_inodes(table: &str, port: u16) -> BTreeSet<Ino> {
    table
        .lines()
        .skip(1) // header
        .filter_map(parse_socket_line)
        .filter(|&(local_port, state, inode)| {
            local_port == port && state == TCP_LISTEN && inode != 0
        })
        .map(|(_, _, inode)| inode)
        .collect()
}

/// Extract the inode from an fd link of the form `socket:[12345]`
pub fn socket_inode(link: &Path) -> Option<Ino> {
    const SOCKET_PREFIX: &str = "socket:[";

    let link_str = link.to_str()?;
    let link_str = link_str.strip_prefix(SOCKET_PREFIX)?;

    link_str.strip_suffix(']')?.parse().ok()
}

/// Parse `lsof -t` output: one pid per line
pub fn parse_lsof_pids(output: &str) -> BTreeSet<ProcessId> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Processes owning a set of listening sockets, and the sockets left unmatched
#[derive(Debug, Default, PartialEq)]
pub struct SocketOwners {
    pub pids: BTreeSet<ProcessId>,
    /// Listening inodes no inspected process holds
    pub unresolved: BTreeSet<Ino>,
    /// Processes whose descriptors could not be listed
    pub uninspected: usize,
}

/// Match listening socket inodes to the processes holding them
///
/// `processes` yields each pid with its fd link targets, or the error hit
/// while listing them. Every process is visited, since forked workers can
/// share one listening socket.
pub fn socket_owners<P, L, E>(inodes: &BTreeSet<Ino>, processes: P) -> SocketOwners
where
    P: IntoIterator<Item = (ProcessId, Result<L, E>)>,
    L: IntoIterator<Item = PathBuf>,
{
    let mut owners = SocketOwners {
        unresolved: inodes.clone(),
        ..Default::default()
    };

    for (pid, links) in processes {
        let Ok(links) = links else {
            owners.uninspected += 1;
            continue;
        };

        let mut owns_listener = false;
        for inode in links.into_iter().filter_map(|link| socket_inode(&link)) {
            if inodes.contains(&inode) {
                owns_listener = true;
                owners.unresolved.remove(&inode);
            }
        }

        if owns_listener {
            owners.pids.insert(pid);
        }
    }

    owners
}

#[cfg(target_os = "linux")]
pub fn listening_pids_procfs(port: u16) -> anyhow::Result<BTreeSet<ProcessId>> {
    use std::fs::{read_dir, read_link, read_to_string};
    use tracing::debug;

    let mut readable = false;
    let mut inodes = BTreeSet::new();
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        match read_to_string(table) {
            Ok(content) => {
                readable = true;
                inodes.extend(listening_inodes(&content, port));
            }
            Err(e) => debug!(table, error = %e, "Socket table unreadable"),
        }
    }

    if !readable {
        anyhow::bail!("cannot read /proc/net/tcp or /proc/net/tcp6");
    }

    if inodes.is_empty() {
        return Ok(BTreeSet::new());
    }

    let processes = read_dir("/proc")?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let pid = entry.file_name().to_str()?.parse::<ProcessId>().ok()?;
            let links = read_dir(entry.path().join("fd")).map(|fds| {
                fds.filter_map(|fd| fd.ok())
                    .filter_map(|fd| read_link(fd.path()).ok())
            });
            Some((pid, links))
        });

    let owners = socket_owners(&inodes, processes);

    // Held by another user's process, or by one that exited mid-scan.
    if !owners.unresolved.is_empty() {
        anyhow::bail!(
            "port {port} has listening sockets owned by processes that could not be inspected \
             (inodes {:?}, {} processes unreadable)",
            owners.unresolved,
            owners.uninspected
        );
    }

    Ok(owners.pids)
}

#[cfg(all(unix, not(target_os = "linux")))]
pub async fn listening_pids_lsof(port: u16) -> anyhow::Result<BTreeSet<ProcessId>> {
    use anyhow::Context;
    use tokio::process::Command;

    let output = Command::new("lsof")
        .args(["-nP", "-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
        .output()
        .await
        .context("failed to run lsof")?;

    let stdout = String::from_utf8_lossy(&output.stdout);

    // lsof exits 1 when nothing matched.
    let nothing_found = output.status.code() == Some(1) && stdout.trim().is_empty();
    if !output.status.success() && !nothing_found {
        anyhow::bail!(
            "lsof exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(parse_lsof_pids(&stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const TCP: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1388 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 48213 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 48999 1 0000000000000000 100 0 0 10 0
   2: 0100007F:1388 0100007F:D2F0 01 00000000:00000000 00:00000000 00000000  1000        0 51234 1 0000000000000000 20 4 30 10 -1
   3: 00000000:C350 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 50000 1 0000000000000000 100 0 0 10 0
";

    const TCP6: &str = "\
  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:1388 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 48214 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn test_listening_inodes_filters_port_and_state() {
        // 0x1388 = 5000; the ESTABLISHED row on 5000 and the row on 0xC350 = 50000 are ignored
        assert_eq!(listening_inodes(TCP, 5000), BTreeSet::from([48213]));
        assert_eq!(listening_inodes(TCP, 8080), BTreeSet::from([48999]));
        assert!(listening_inodes(TCP, 3000).is_empty());
    }

    #[test]
    fn test_listening_inodes_ipv6() {
        assert_eq!(listening_inodes(TCP6, 5000), BTreeSet::from([48214]));
    }

    #[test]
    fn test_listening_inodes_skips_malformed_rows() {
        let table = "header\nnot a socket row\n   0: 00000000:zzzz 00000000:0000 0A\n";
        assert!(listening_inodes(table, 5000).is_empty());
    }

    #[test]
    fn test_socket_inode() {
        assert_eq!(socket_inode(&PathBuf::from("socket:[48213]")), Some(48213));
        assert_eq!(socket_inode(&PathBuf::from("pipe:[48213]")), None);
        assert_eq!(socket_inode(&PathBuf::from("/var/log/server.log")), None);
        assert_eq!(socket_inode(&PathBuf::from("socket:[]")), None);
    }

    #[test]
    fn test_parse_lsof_pids() {
        assert_eq!(parse_lsof_pids("4121\n4122\n4121\n"), BTreeSet::from([4121, 4122]));
        assert!(parse_lsof_pids("").is_empty());
        assert_eq!(parse_lsof_pids("  77  \nnoise\n"), BTreeSet::from([77]));
    }

    fn links(targets: &[&str]) -> io::Result<Vec<PathBuf>> {
        Ok(targets.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn test_socket_owners_matches_every_holder() {
        let inodes = BTreeSet::from([48213, 48214]);
        let processes = vec![
            (1, links(&["/dev/null", "socket:[999]"])),
            (4121, links(&["socket:[48213]", "pipe:[7]"])),
            (4122, links(&["socket:[48213]", "socket:[48214]"])),
        ];

        let owners = socket_owners(&inodes, processes);
        assert_eq!(owners.pids, BTreeSet::from([4121, 4122]));
        assert!(owners.unresolved.is_empty());
        assert_eq!(owners.uninspected, 0);
    }

    #[test]
    fn test_socket_owners_reports_unreadable_owner() {
        let inodes = BTreeSet::from([48213]);
        let processes = vec![
            (812, Err(io::Error::from(io::ErrorKind::PermissionDenied))),
            (4121, links(&["socket:[51234]"])),
        ];

        let owners = socket_owners(&inodes, processes);
        assert!(owners.pids.is_empty());
        assert_eq!(owners.unresolved, BTreeSet::from([48213]));
        assert_eq!(owners.uninspected, 1);
    }

    #[test]
    fn test_socket_owners_unreadable_bystander_is_harmless() {
        let inodes = BTreeSet::from([48213]);
        let processes = vec![
            (1, Err(io::Error::from(io::ErrorKind::PermissionDenied))),
            (4121, links(&["socket:[48213]"])),
        ];

        let owners = socket_owners(&inodes, processes);
        assert_eq!(owners.pids, BTreeSet::from([4121]));
        assert!(owners.unresolved.is_empty());
        assert_eq!(owners.uninspected, 1);
    }
}
