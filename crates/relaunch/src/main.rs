use anyhow::Context;
use clap::Parser;
use relaunch::ProcessHandle;
use relaunch::cli::Cli;
use relaunch::logging::init_tracing;
use tracing::warn;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.into_config().context("invalid configuration")?;
    let report = relaunch::reclaim_and_launch_platform(&config)
        .await
        .with_context(|| format!("failed to restart `{}`", config.display_command()))?;

    if !report.is_clean() {
        warn!(
            problems = report.failures.len(),
            "Server launched after non-fatal problems"
        );
    }

    let pid = report
        .child
        .get_pid()
        .map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
    println!(
        "Server starting (pid {pid}). Logging to {}",
        config.log_path.display()
    );

    Ok(())
}
