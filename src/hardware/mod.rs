//! The hardware module contains the [crate::channel::IsoTPChannel] implementations
//! used to reach an ECU, either over a real CAN interface or a simulated one

pub mod simulation;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

/// Returns true if a network interface with the given name exists on this machine
pub fn is_interface_present(name: &str) -> bool {
    std::path::PathBuf::from(format!("/sys/class/net/{name}")).exists()
}
