//! Startup check of the network link.
//!
//! Association with the access point is handled by the OS. The agent only
//! refuses to start when the configured interface is missing or down.

use std::path::Path;
use tracing::info;

pub const SYSFS_NET: &str = "/sys/class/net";

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Network interface {0} not found")]
    MissingInterface(String),

    #[error("Network interface {interface} is {state}")]
    Down { interface: String, state: String },
}

/// Verifies that `interface` reports an operational state of `up`.
///
/// `unknown` is accepted as well since several drivers never report a state.
pub fn check_link(sysfs_root: &Path, interface: &str) -> Result<(), LinkError> {
    let operstate = sysfs_root.join(interface).join("operstate");
    let state = std::fs::read_to_string(&operstate)
        .map_err(|_| LinkError::MissingInterface(interface.to_string()))?;
    let state = state.trim();

    match state {
        "up" | "unknown" => {
            info!("Network interface {} is {}", interface, state);
            Ok(())
        }
        other => Err(LinkError::Down {
            interface: interface.to_string(),
            state: other.to_string(),
        }),
    }
}
