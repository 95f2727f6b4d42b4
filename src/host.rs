//! Host subsystems the bridge drives
//!
//! The bridge never touches hardware itself. Enabling the function, granting
//! interrupt vectors, registering clocks and creating the platform device are
//! all delegated to the embedding kernel through these traits.

use alloc::sync::Arc;

use crate::driver::PciDriver;
use crate::error::{ClockError, PciError, PlatformError};
use crate::irq::IrqVectors;
use crate::pci::FunctionAddress;
use crate::platform::PlatformDeviceInfo;

/// Handle to a clock registered with the host clock framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId(pub u32);

/// Handle to a device registered on the host platform bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformDeviceId(pub u32);

/// Opaque address-translation context (DMA ops and IOMMU domain) of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DmaContext(pub u64);

/// PCI configuration and interrupt services
pub trait PciBus: Send + Sync {
    /// Enable memory decoding for the function
    fn enable_device(&self, function: FunctionAddress) -> Result<(), PciError>;

    /// Enable bus mastering so the function can DMA
    fn set_master(&self, function: FunctionAddress);

    /// Allocate exactly `count` MSI vectors
    fn alloc_msi_vectors(&self, function: FunctionAddress, count: usize)
        -> Result<IrqVectors, PciError>;

    /// Release every vector previously allocated for the function
    fn free_irq_vectors(&self, function: FunctionAddress);

    /// Address-translation context the function performs DMA through
    fn dma_context(&self, function: FunctionAddress) -> DmaContext;
}

/// Fixed-rate clock registration
pub trait ClockTree: Send + Sync {
    fn register_fixed_rate(
        &self,
        owner: FunctionAddress,
        name: &str,
        rate_hz: u32,
    ) -> Result<ClockId, ClockError>;

    fn unregister_clock(&self, clock: ClockId);
}

/// Platform device registration
pub trait PlatformBus: Send + Sync {
    fn register_full(&self, info: &PlatformDeviceInfo<'_>) -> Result<PlatformDeviceId, PlatformError>;

    /// Replace the DMA context of a registered device (`None` restores the default)
    fn set_dma_context(&self, device: PlatformDeviceId, context: Option<DmaContext>);

    fn unregister_device(&self, device: PlatformDeviceId);
}

/// Host PCI driver core
pub trait DriverRegistry: Send + Sync {
    /// Make the driver eligible for probing; the host's negative errno on refusal
    fn register_driver(&self, driver: Arc<dyn PciDriver>) -> Result<(), i32>;

    fn unregister_driver(&self, name: &'static str);
}

/// The set of host subsystems one bridge instance talks to
#[derive(Clone)]
pub struct HostServices {
    pub pci: Arc<dyn PciBus>,
    pub clocks: Arc<dyn ClockTree>,
    pub platform: Arc<dyn PlatformBus>,
}

impl HostServices {
    pub fn new(
        pci: Arc<dyn PciBus>,
        clocks: Arc<dyn ClockTree>,
        platform: Arc<dyn PlatformBus>,
    ) -> Self {
        Self { pci, clocks, platform }
    }

    /// Use one object implementing every subsystem
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: PciBus + ClockTree + PlatformBus + 'static,
    {
        Self {
            pci: host.clone(),
            clocks: host.clone(),
            platform: host,
        }
    }
}
