//! Windows-specific port reclaiming implementation

pub mod netstat;
mod windows_port_reclaimer;

pub use windows_port_reclaimer::{WindowsPortReclaimer, WindowsProcessHandle};

/// Windows-specific port reclaimer factory
pub struct WindowsPortReclaimerFactory;

impl relaunch_core::PortReclaimerFactory for WindowsPortReclaimerFactory {
    type Reclaimer = WindowsPortReclaimer;

    fn create_port_reclaimer() -> Self::Reclaimer {
        use relaunch_core::PortReclaimer;
        WindowsPortReclaimer::new()
    }

    fn platform_name() -> &'static str {
        "Windows"
    }
}
