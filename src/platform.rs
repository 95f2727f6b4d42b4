//! Platform device contract
//!
//! What the vendor-neutral MAC driver receives: a device named
//! [`PLAT_DRIVER_NAME`], the two-entry resource array, and a platform-data
//! payload describing clocks, interrupts and (for quirk variants) the MAC
//! capabilities and PHY interface.

use alloc::sync::Arc;
use core::fmt;

use crate::clocks::{ClockRef, ClockSet, ExtendedClocks};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{DmaContext, PlatformBus, PlatformDeviceId};
use crate::irq::IrqGrant;
use crate::pci::FunctionAddress;
use crate::quirks::{CapabilityDescriptor, DeviceType, FixedLink, MacbCaps, PhyInterfaceMode, FIXED_LINK_PROPERTY};
use crate::resources::BridgeResourceSet;

pub use crate::config::PLAT_DRIVER_NAME;

/// Quirk-variant part of the platform data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuirkData {
    pub dev_type: DeviceType,
    pub caps: MacbCaps,
    pub phy_interface: PhyInterfaceMode,
    pub fixed_link: Option<FixedLink>,
    /// Present when the extended clocks were provisioned
    pub clocks: Option<ExtendedClockRefs>,
}

/// The extended clocks as the MAC driver looks them up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedClockRefs {
    pub txclk: ClockRef,
    pub rxclk: ClockRef,
    pub tsuclk: ClockRef,
}

impl From<&ExtendedClocks> for ExtendedClockRefs {
    fn from(ext: &ExtendedClocks) -> Self {
        Self {
            txclk: ext.txclk().clone(),
            rxclk: ext.rxclk().clone(),
            tsuclk: ext.tsuclk().clone(),
        }
    }
}

/// Platform data payload handed to the MAC driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformData {
    pub pclk: ClockRef,
    pub hclk: ClockRef,
    pub irq: IrqGrant,
    pub quirk: Option<QuirkData>,
}

impl PlatformData {
    /// Assemble the payload; quirk data is present whenever a descriptor is
    pub fn new(
        clocks: &ClockSet,
        irq: &IrqGrant,
        descriptor: Option<&'static CapabilityDescriptor>,
    ) -> Self {
        let quirk = descriptor.map(|desc| QuirkData {
            dev_type: desc.dev_type,
            caps: desc.caps,
            phy_interface: desc.phy_interface,
            fixed_link: desc.fixed_link,
            clocks: clocks.extended().map(ExtendedClockRefs::from),
        });

        Self {
            pclk: clocks.baseline().pclk().clone(),
            hclk: clocks.baseline().hclk().clone(),
            irq: irq.clone(),
            quirk,
        }
    }
}

/// A software-node property attached to the platform device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareProperty {
    pub name: &'static str,
    pub cells: [u32; 5],
}

/// Where the platform device gets its firmware description from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareNode {
    /// Share the PCI function's firmware node
    InheritParent,
    /// A fresh software node carrying only these properties
    Software(SoftwareProperty),
}

impl FirmwareNode {
    pub fn for_descriptor(descriptor: Option<&CapabilityDescriptor>) -> Self {
        match descriptor.and_then(|d| d.fixed_link) {
            Some(link) => FirmwareNode::Software(SoftwareProperty {
                name: FIXED_LINK_PROPERTY,
                cells: link.property_cells(),
            }),
            None => FirmwareNode::InheritParent,
        }
    }
}

/// Everything the platform bus needs to create the device
#[derive(Debug, Clone, Copy)]
pub struct PlatformDeviceInfo<'a> {
    pub parent: FunctionAddress,
    pub name: &'static str,
    pub id: u16,
    pub resources: &'a BridgeResourceSet,
    pub data: &'a PlatformData,
    pub dma_mask: u64,
    pub firmware_node: FirmwareNode,
}

/// A registered platform device; unregistered when dropped.
///
/// If a DMA context was propagated to the device it is cleared first so the
/// platform bus does not tear down the parent's translation domain.
pub struct Registration {
    device: PlatformDeviceId,
    parent: FunctionAddress,
    dma_propagated: bool,
    bus: Arc<dyn PlatformBus>,
}

impl Registration {
    pub fn register(bus: &Arc<dyn PlatformBus>, info: &PlatformDeviceInfo<'_>) -> BridgeResult<Self> {
        match bus.register_full(info) {
            Ok(device) => {
                log::trace!(target: "macb_pci", "{}: registered {}.{}", info.parent, info.name, info.id);
                Ok(Self {
                    device,
                    parent: info.parent,
                    dma_propagated: false,
                    bus: bus.clone(),
                })
            }
            Err(e) => {
                log::error!(target: "macb_pci", "{}: registering {}.{} failed: {}", info.parent, info.name, info.id, e);
                Err(BridgeError::PlatformRegistrationFailure(e))
            }
        }
    }

    /// Make the device DMA through its parent's translation context
    pub fn propagate_dma(&mut self, context: DmaContext) {
        self.bus.set_dma_context(self.device, Some(context));
        self.dma_propagated = true;
    }

    pub fn device(&self) -> PlatformDeviceId {
        self.device
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.dma_propagated {
            self.bus.set_dma_context(self.device, None);
        }
        log::trace!(target: "macb_pci", "{}: unregistering platform device {:?}", self.parent, self.device);
        self.bus.unregister_device(self.device);
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Registration")
            .field("device", &self.device)
            .field("parent", &self.parent)
            .field("dma_propagated", &self.dma_propagated)
            .finish()
    }
}
