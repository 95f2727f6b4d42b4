//! Cadence GEM PCI wrapper
//!
//! Binds Cadence GEM Ethernet controllers found behind PCI (the Cadence
//! reference design and Phytium's GMAC 3P0 variants) and republishes each one
//! as a `macb` platform device, so the platform MAC driver can run them
//! unchanged. The bridge provides the register window and interrupt as
//! platform resources, fixed-rate clocks the MAC driver looks up by name, and
//! the per-variant capability data.
//!
//! The host kernel supplies PCI, clock, platform-bus and driver-core services
//! through the traits in [`host`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bridge;
pub mod clocks;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod irq;
pub mod logging;
pub mod pci;
pub mod platform;
pub mod quirks;
pub mod resources;

#[cfg(test)]
pub mod testing;

pub use bridge::{attach, BridgeState, PlatformDeviceHandle};
pub use driver::{module_exit, module_init, MacbPciDriver, PciDriver};
pub use error::{BridgeError, BridgeResult, ErrorCategory};
pub use host::{ClockTree, DriverRegistry, HostServices, PciBus, PlatformBus};
pub use pci::{FunctionAddress, PhysicalFunction};
pub use quirks::{resolve, CapabilityDescriptor, MATCH_TABLE};
