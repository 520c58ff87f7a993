#![cfg(unix)]

use relaunch::{
    PlatformPortReclaimerFactory, PortReclaimerFactory, ProcessHandle, ProcessTerminator,
    RelaunchConfig, RelaunchError, TerminationResult, reclaim_and_launch_platform,
};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn config(dir: &Path, command: &str, args: &[&str]) -> RelaunchConfig {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .try_init();

    RelaunchConfig::builder()
        .port(free_port())
        .command(command)
        .args(args.iter().copied())
        .working_directory(dir)
        .log_path(dir.join("server.log"))
        .settle_delay_ms(0u64)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_launches_on_free_port_and_leaves_child_running() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "sleep", &["30"]);

    let report = tokio::time::timeout(Duration::from_secs(5), reclaim_and_launch_platform(&config))
        .await
        .expect("reclaim must not wait for the server")
        .unwrap();

    assert!(report.discovered.is_empty());
    assert!(report.terminated.is_empty());
    let pid = report.child.get_pid().unwrap();
    assert!(report.child.is_running().await);
    assert!(config.log_path.exists());

    // Dropping the handle must not take the server down with it.
    drop(report);
    let reclaimer = PlatformPortReclaimerFactory::create_port_reclaimer();
    assert_eq!(reclaimer.force_kill(pid).await, TerminationResult::Success);
}

/// Start a stand-in for the previous server, bound to `port`
///
/// Returns `None` when no `python3` is available to play that part.
fn spawn_listener(port: u16) -> Option<std::process::Child> {
    let script = format!(
        "import socket, time\n\
         s = socket.socket()\n\
         s.bind(('127.0.0.1', {port}))\n\
         s.listen()\n\
         time.sleep(60)\n"
    );
    let child = Command::new("python3")
        .args(["-c", script.as_str()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while std::net::TcpStream::connect(("127.0.0.1", port)).is_err() {
        assert!(Instant::now() < deadline, "listener never came up on {port}");
        std::thread::sleep(Duration::from_millis(50));
    }
    Some(child)
}

#[tokio::test]
async fn test_kills_previous_server_then_launches() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "sleep", &["30"]);
    config.settle_delay_ms = 200;
    config.release_timeout_ms = Some(5_000);

    let Some(mut previous) = spawn_listener(config.port) else {
        eprintln!("python3 not available, skipping");
        return;
    };
    let previous_pid = previous.id();

    let report = reclaim_and_launch_platform(&config).await.unwrap();

    assert!(report.discovered.contains(&previous_pid));
    assert!(report.terminated.contains(&previous_pid));
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);

    let status = previous.wait().unwrap();
    assert_eq!(status.signal(), Some(9));
    assert!(std::net::TcpStream::connect(("127.0.0.1", config.port)).is_err());

    let pid = report.child.get_pid().unwrap();
    assert!(report.child.is_running().await);
    let reclaimer = PlatformPortReclaimerFactory::create_port_reclaimer();
    assert_eq!(reclaimer.force_kill(pid).await, TerminationResult::Success);
}

#[tokio::test]
async fn test_server_output_lands_in_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        "sh",
        &["-c", "echo listening on $PORT; echo warning 1>&2"],
    );
    let config = RelaunchConfig {
        env: [("PORT".to_string(), config.port.to_string())].into(),
        ..config
    };
    std::fs::write(&config.log_path, "output of an older server\n").unwrap();

    let mut report = reclaim_and_launch_platform(&config).await.unwrap();
    assert!(report.child.wait().await.unwrap().success());

    let log = std::fs::read_to_string(&config.log_path).unwrap();
    assert!(!log.contains("older server"));
    assert!(log.contains(&format!("listening on {}", config.port)));
    assert!(log.contains("warning"));
}

#[tokio::test]
async fn test_missing_executable_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "no-such-server-binary-9d2e", &[]);

    let err = reclaim_and_launch_platform(&config).await.unwrap_err();

    assert!(err.is_fatal());
    match err {
        RelaunchError::LaunchFailed { command, source } => {
            assert_eq!(command, "no-such-server-binary-9d2e");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected LaunchFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_working_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "sleep", &["1"]);
    config.working_directory = dir.path().join("server");

    let err = reclaim_and_launch_platform(&config).await.unwrap_err();

    assert!(matches!(err, RelaunchError::LaunchFailed { .. }));
}
