//! Capability resolver
//!
//! Static per-variant quirk data for the controllers this driver claims, and
//! the lookup that selects it from a function's vendor/device/subsystem ids.
//! The tables are immutable and shared by every caller without locking.

use core::fmt;

use crate::error::{BridgeError, BridgeResult};
use crate::pci::{
    PciDeviceId, PhysicalFunction, CDNS_DEVICE_ID, CDNS_VENDOR_ID, PCI_DEVICE_ID_GMAC_3P0,
    PCI_SUBDEVICE_ID_1000BASEX, PCI_SUBDEVICE_ID_SGMII, PCI_SUBDEVICE_ID_USXGMII,
    PCI_VENDOR_ID_PHYTIUM,
};

bitflags::bitflags! {
    /// MAC capability flags handed to the MAC driver
    pub struct MacbCaps: u32 {
        const ISR_CLEAR_ON_WRITE = 1 << 0;
        const USRIO_HAS_CLKEN = 1 << 1;
        const USRIO_DEFAULT_IS_MII_GMII = 1 << 2;
        const NO_GIGABIT_HALF = 1 << 3;
        const USRIO_DISABLED = 1 << 4;
        const JUMBO = 1 << 5;
        const GEM_HAS_PTP = 1 << 6;
        const BD_RD_PREFETCH = 1 << 7;
        const NEEDS_RSTONUBR = 1 << 8;
        const MIIONRGMII = 1 << 9;
        const NEED_TSUCLK = 1 << 10;
        const TAILPTR = 1 << 11;
        const FIFO_MODE = 1 << 28;
        const GIGABIT_MODE_AVAILABLE = 1 << 29;
        const SG_DISABLED = 1 << 30;
        const MACB_IS_GEM = 1 << 31;
    }
}

/// Capabilities shared by every Phytium GMAC 3P0 variant
pub const PHYTIUM_3P0_CAPS: MacbCaps = MacbCaps::from_bits_truncate(
    MacbCaps::GIGABIT_MODE_AVAILABLE.bits()
        | MacbCaps::JUMBO.bits()
        | MacbCaps::GEM_HAS_PTP.bits()
        | MacbCaps::BD_RD_PREFETCH.bits()
        | MacbCaps::USRIO_DISABLED.bits()
        | MacbCaps::TAILPTR.bits(),
);

/// Vendor-specific device type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Phytium3p0,
}

impl DeviceType {
    /// Whether this variant needs the txclk/rxclk/tsuclk triple
    pub fn needs_extended_clocks(self) -> bool {
        match self {
            DeviceType::Phytium3p0 => true,
        }
    }
}

/// PHY interface between the MAC and the PHY/PCS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyInterfaceMode {
    Sgmii,
    Usxgmii,
}

impl fmt::Display for PhyInterfaceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PhyInterfaceMode::Sgmii => "sgmii",
            PhyInterfaceMode::Usxgmii => "usxgmii",
        };
        write!(f, "{}", name)
    }
}

/// Statically known link parameters (no autonegotiation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLink {
    pub speed_mbps: u32,
    pub full_duplex: bool,
    pub pause: bool,
    pub asym_pause: bool,
}

/// Name of the software-node property carrying a fixed link
pub const FIXED_LINK_PROPERTY: &str = "fixed-link";

impl FixedLink {
    pub const fn forced(speed_mbps: u32) -> Self {
        Self {
            speed_mbps,
            full_duplex: true,
            pause: true,
            asym_pause: false,
        }
    }

    /// A fixed link never negotiates
    pub fn autoneg_disabled(&self) -> bool {
        true
    }

    /// Cells of the legacy `fixed-link` property: phy id, duplex, speed, pause, asym pause
    pub fn property_cells(&self) -> [u32; 5] {
        [
            0,
            self.full_duplex as u32,
            self.speed_mbps,
            self.pause as u32,
            self.asym_pause as u32,
        ]
    }
}

/// Quirk data for one controller variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub dev_type: DeviceType,
    pub caps: MacbCaps,
    pub phy_interface: PhyInterfaceMode,
    pub fixed_link: Option<FixedLink>,
}

impl CapabilityDescriptor {
    pub fn needs_extended_clocks(&self) -> bool {
        self.dev_type.needs_extended_clocks()
    }
}

pub static PHYTIUM_SGMII: CapabilityDescriptor = CapabilityDescriptor {
    dev_type: DeviceType::Phytium3p0,
    caps: PHYTIUM_3P0_CAPS,
    phy_interface: PhyInterfaceMode::Sgmii,
    fixed_link: None,
};

// The 1000BASE-X boards run the MAC in SGMII mode with a forced 1G link.
pub static PHYTIUM_1000BASEX: CapabilityDescriptor = CapabilityDescriptor {
    dev_type: DeviceType::Phytium3p0,
    caps: PHYTIUM_3P0_CAPS,
    phy_interface: PhyInterfaceMode::Sgmii,
    fixed_link: Some(FixedLink::forced(1000)),
};

pub static PHYTIUM_USXGMII: CapabilityDescriptor = CapabilityDescriptor {
    dev_type: DeviceType::Phytium3p0,
    caps: PHYTIUM_3P0_CAPS,
    phy_interface: PhyInterfaceMode::Usxgmii,
    fixed_link: Some(FixedLink::forced(10000)),
};

/// Functions claimed by this driver, in match priority order
pub static MATCH_TABLE: [PciDeviceId; 4] = [
    PciDeviceId::device(CDNS_VENDOR_ID, CDNS_DEVICE_ID),
    PciDeviceId::device_sub(
        PCI_VENDOR_ID_PHYTIUM,
        PCI_DEVICE_ID_GMAC_3P0,
        PCI_VENDOR_ID_PHYTIUM,
        PCI_SUBDEVICE_ID_SGMII,
    )
    .with_driver_data(&PHYTIUM_SGMII),
    PciDeviceId::device_sub(
        PCI_VENDOR_ID_PHYTIUM,
        PCI_DEVICE_ID_GMAC_3P0,
        PCI_VENDOR_ID_PHYTIUM,
        PCI_SUBDEVICE_ID_1000BASEX,
    )
    .with_driver_data(&PHYTIUM_1000BASEX),
    PciDeviceId::device_sub(
        PCI_VENDOR_ID_PHYTIUM,
        PCI_DEVICE_ID_GMAC_3P0,
        PCI_VENDOR_ID_PHYTIUM,
        PCI_SUBDEVICE_ID_USXGMII,
    )
    .with_driver_data(&PHYTIUM_USXGMII),
];

/// First match-table entry claiming the function, if any
pub fn match_function(function: &PhysicalFunction) -> Option<&'static PciDeviceId> {
    MATCH_TABLE.iter().find(|id| id.matches(function))
}

/// Resolve the quirk descriptor for a vendor/device/subsystem tuple.
///
/// Baseline (Cadence) ids resolve to `None`. Partner (Phytium) ids must match
/// exactly one table entry including the subsystem ids, otherwise the lookup
/// fails with [`BridgeError::DescriptorMismatch`]. Any other vendor is not ours.
pub fn resolve(
    vendor_id: u16,
    device_id: u16,
    subsystem_vendor_id: Option<u16>,
    subsystem_device_id: Option<u16>,
) -> BridgeResult<Option<&'static CapabilityDescriptor>> {
    match vendor_id {
        CDNS_VENDOR_ID => Ok(None),
        PCI_VENDOR_ID_PHYTIUM => {
            let mut candidates = MATCH_TABLE.iter().filter(|id| {
                id.vendor_id == vendor_id
                    && id.device_id == device_id
                    && id.subsystem_vendor_id == subsystem_vendor_id
                    && id.subsystem_device_id == subsystem_device_id
            });

            match (candidates.next(), candidates.next()) {
                (Some(PciDeviceId { driver_data: Some(data), .. }), None) => Ok(Some(*data)),
                _ => Err(BridgeError::DescriptorMismatch {
                    vendor_id,
                    device_id,
                    subsystem_vendor_id,
                    subsystem_device_id,
                }),
            }
        }
        _ => Err(BridgeError::UnsupportedDevice { vendor_id, device_id }),
    }
}

/// [`resolve`] for an enumerated function
pub fn resolve_function(
    function: &PhysicalFunction,
) -> BridgeResult<Option<&'static CapabilityDescriptor>> {
    resolve(
        function.vendor_id,
        function.device_id,
        function.subsystem_vendor_id,
        function.subsystem_device_id,
    )
}
