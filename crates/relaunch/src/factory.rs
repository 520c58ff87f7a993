use relaunch_core::PortReclaimerFactory;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformPortReclaimerFactory;

impl PortReclaimerFactory for PlatformPortReclaimerFactory {
    #[cfg(unix)]
    type Reclaimer = relaunch_unix::UnixPortReclaimer;

    #[cfg(windows)]
    type Reclaimer = relaunch_windows::WindowsPortReclaimer;

    fn create_port_reclaimer() -> Self::Reclaimer {
        #[cfg(unix)]
        return relaunch_unix::UnixPortReclaimerFactory::create_port_reclaimer();

        #[cfg(windows)]
        return relaunch_windows::WindowsPortReclaimerFactory::create_port_reclaimer();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return relaunch_unix::UnixPortReclaimerFactory::platform_name();

        #[cfg(windows)]
        return relaunch_windows::WindowsPortReclaimerFactory::platform_name();
    }
}

#[cfg(not(any(unix, windows)))]
compile_error!("Unsupported platform: only Unix and Windows are currently supported");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        let platform = PlatformPortReclaimerFactory::platform_name();
        assert!(platform == "Unix" || platform == "Windows");

        let _reclaimer = PlatformPortReclaimerFactory::create_port_reclaimer();
    }
}
