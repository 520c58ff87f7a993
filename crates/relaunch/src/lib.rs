//! relaunch - free a TCP port and relaunch the server that should own it
//!
//! The platform is chosen at compile time; see [`PlatformPortReclaimerFactory`].

pub mod cli;
mod factory;
pub mod logging;

pub use factory::PlatformPortReclaimerFactory;
pub use relaunch_core::*;

use tracing::info;

/// Port reclaimer for the platform this crate was built for
pub type PlatformPortReclaimer = <PlatformPortReclaimerFactory as PortReclaimerFactory>::Reclaimer;

/// Handle to a server launched by [`PlatformPortReclaimer`]
pub type PlatformProcessHandle = <PlatformPortReclaimer as ProcessLauncher>::Handle;

/// Run one reclaim-and-launch cycle with the current platform's reclaimer
pub async fn reclaim_and_launch_platform(
    config: &RelaunchConfig,
) -> Result<ReclaimReport<PlatformProcessHandle>, RelaunchError> {
    let reclaimer = PlatformPortReclaimerFactory::create_port_reclaimer();
    info!(
        platform = PlatformPortReclaimerFactory::platform_name(),
        port = %config.port,
        "Reclaiming port"
    );

    reclaim_and_launch(&reclaimer, config).await
}
