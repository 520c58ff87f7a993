//! relaunch core - platform-independent port reclaiming
//!
//! This crate provides the configuration, error taxonomy, platform traits, and
//! the reclaim-and-launch sequence shared by the platform-specific crates.

mod config;
mod error;
mod process;
mod reclaim;
mod sink;

pub use config::*;
pub use error::*;
pub use process::*;
pub use reclaim::*;
pub use sink::*;
