//! PCI side of the bridge
//!
//! Identity of the PCI functions this driver binds to and the match-table
//! entry type the host enumerator uses to decide whether we claim a function.

use core::fmt;

use crate::quirks::CapabilityDescriptor;

/// Cadence Design Systems (baseline, no quirks)
pub const CDNS_VENDOR_ID: u16 = 0x17cd;
pub const CDNS_DEVICE_ID: u16 = 0xe007;

/// Phytium Technology (partner vendor, quirk data required)
pub const PCI_VENDOR_ID_PHYTIUM: u16 = 0x1db7;
pub const PCI_DEVICE_ID_GMAC_3P0: u16 = 0xdc3b;

/// Phytium GMAC 3P0 subsystem device ids, one per board interface
pub const PCI_SUBDEVICE_ID_SGMII: u16 = 0x1000;
pub const PCI_SUBDEVICE_ID_1000BASEX: u16 = 0x1001;
pub const PCI_SUBDEVICE_ID_USXGMII: u16 = 0x1004;
pub const PCI_SUBDEVICE_ID_10GBASER: u16 = 0x1005;

/// Maximum number of devices per bus
pub const MAX_SLOT: u8 = 32;
/// Maximum number of functions per device
pub const MAX_FUNCTION: u8 = 8;

/// Bus/slot/function triple of a PCI function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionAddress {
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
}

impl FunctionAddress {
    pub const fn new(bus: u8, slot: u8, function: u8) -> Self {
        Self { bus, slot, function }
    }

    /// Encoded device/function byte (slot in bits 7:3, function in bits 2:0)
    pub const fn devfn(&self) -> u8 {
        ((self.slot & 0x1F) << 3) | (self.function & 0x07)
    }

    /// System-wide instance id: bus in the high byte, devfn in the low byte
    pub const fn instance_id(&self) -> u16 {
        ((self.bus as u16) << 8) | self.devfn() as u16
    }

    pub fn is_valid(&self) -> bool {
        self.slot < MAX_SLOT && self.function < MAX_FUNCTION
    }
}

impl fmt::Display for FunctionAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.slot, self.function)
    }
}

/// A memory BAR as assigned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryBar {
    pub base: u64,
    pub len: u64,
}

/// One enumerated PCI function, as seen by the bridge (read-only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalFunction {
    pub address: FunctionAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    pub subsystem_vendor_id: Option<u16>,
    pub subsystem_device_id: Option<u16>,
    pub bar0: MemoryBar,
    /// Pre-assigned INTx line, if the platform routed one
    pub legacy_irq: Option<u32>,
    pub dma_mask: u64,
}

impl PhysicalFunction {
    pub fn new(address: FunctionAddress, vendor_id: u16, device_id: u16) -> Self {
        Self {
            address,
            vendor_id,
            device_id,
            subsystem_vendor_id: None,
            subsystem_device_id: None,
            bar0: MemoryBar::default(),
            legacy_irq: None,
            dma_mask: u32::MAX as u64,
        }
    }

    pub fn with_subsystem(mut self, vendor_id: u16, device_id: u16) -> Self {
        self.subsystem_vendor_id = Some(vendor_id);
        self.subsystem_device_id = Some(device_id);
        self
    }

    pub fn with_bar0(mut self, base: u64, len: u64) -> Self {
        self.bar0 = MemoryBar { base, len };
        self
    }

    pub fn with_legacy_irq(mut self, line: u32) -> Self {
        self.legacy_irq = Some(line);
        self
    }

    pub fn with_dma_mask(mut self, mask: u64) -> Self {
        self.dma_mask = mask;
        self
    }
}

/// Match-table entry: `None` in a subsystem field matches any value
#[derive(Debug, Clone, Copy)]
pub struct PciDeviceId {
    pub vendor_id: u16,
    pub device_id: u16,
    pub subsystem_vendor_id: Option<u16>,
    pub subsystem_device_id: Option<u16>,
    pub driver_data: Option<&'static CapabilityDescriptor>,
}

impl PciDeviceId {
    /// Entry matching a vendor/device pair with any subsystem
    pub const fn device(vendor_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            device_id,
            subsystem_vendor_id: None,
            subsystem_device_id: None,
            driver_data: None,
        }
    }

    /// Entry matching an exact vendor/device/subsystem tuple
    pub const fn device_sub(
        vendor_id: u16,
        device_id: u16,
        subsystem_vendor_id: u16,
        subsystem_device_id: u16,
    ) -> Self {
        Self {
            vendor_id,
            device_id,
            subsystem_vendor_id: Some(subsystem_vendor_id),
            subsystem_device_id: Some(subsystem_device_id),
            driver_data: None,
        }
    }

    pub const fn with_driver_data(mut self, data: &'static CapabilityDescriptor) -> Self {
        self.driver_data = Some(data);
        self
    }

    pub fn matches_ids(
        &self,
        vendor_id: u16,
        device_id: u16,
        subsystem_vendor_id: Option<u16>,
        subsystem_device_id: Option<u16>,
    ) -> bool {
        if self.vendor_id != vendor_id || self.device_id != device_id {
            return false;
        }

        if let Some(sv) = self.subsystem_vendor_id {
            if subsystem_vendor_id != Some(sv) {
                return false;
            }
        }

        if let Some(sd) = self.subsystem_device_id {
            if subsystem_device_id != Some(sd) {
                return false;
            }
        }

        true
    }

    /// Check if this entry claims the given function
    pub fn matches(&self, function: &PhysicalFunction) -> bool {
        self.matches_ids(
            function.vendor_id,
            function.device_id,
            function.subsystem_vendor_id,
            function.subsystem_device_id,
        )
    }
}
