//! Unix-specific port reclaiming implementation

pub mod socket_table;
mod unix_port_reclaimer;

#[cfg(unix)]
pub use unix_port_reclaimer::{UnixPortReclaimer, UnixProcessHandle};

/// Factory for creating Unix port reclaimers
#[cfg(unix)]
pub struct UnixPortReclaimerFactory;

#[cfg(unix)]
impl relaunch_core::PortReclaimerFactory for UnixPortReclaimerFactory {
    type Reclaimer = UnixPortReclaimer;

    fn create_port_reclaimer() -> Self::Reclaimer {
        use relaunch_core::PortReclaimer;
        UnixPortReclaimer::new()
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
