//! Resource translation
//!
//! The platform device gets exactly two resources, memory first and interrupt
//! second. The MAC driver looks them up by index, so the order is fixed.

use core::fmt;

use crate::config::PCI_DRIVER_NAME;
use crate::irq::IrqGrant;
use crate::pci::PhysicalFunction;

/// Index of the register window in a [`BridgeResourceSet`]
pub const MEMORY_RESOURCE: usize = 0;
/// Index of the interrupt in a [`BridgeResourceSet`]
pub const INTERRUPT_RESOURCE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Memory,
    Interrupt,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResourceKind::Memory => write!(f, "mem"),
            ResourceKind::Interrupt => write!(f, "irq"),
        }
    }
}

/// One normalized resource descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: &'static str,
    /// Base address, or interrupt number
    pub start: u64,
    /// Window length in bytes; 1 for an interrupt
    pub len: u64,
}

impl Resource {
    /// Inclusive end, as the platform bus expects it
    pub fn end(&self) -> u64 {
        self.start.wrapping_add(self.len).wrapping_sub(1)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ResourceKind::Memory => write!(f, "{} [{:#x}-{:#x}]", self.kind, self.start, self.end()),
            ResourceKind::Interrupt => write!(f, "{} {}", self.kind, self.start),
        }
    }
}

/// Memory window followed by interrupt line; never anything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeResourceSet([Resource; 2]);

impl BridgeResourceSet {
    pub fn memory(&self) -> &Resource {
        &self.0[MEMORY_RESOURCE]
    }

    pub fn interrupt(&self) -> &Resource {
        &self.0[INTERRUPT_RESOURCE]
    }

    pub fn as_slice(&self) -> &[Resource] {
        &self.0
    }
}

/// Build the resource set from BAR0 and the interrupt grant
pub fn translate(function: &PhysicalFunction, grant: &IrqGrant) -> BridgeResourceSet {
    BridgeResourceSet([
        Resource {
            kind: ResourceKind::Memory,
            name: PCI_DRIVER_NAME,
            start: function.bar0.base,
            len: function.bar0.len,
        },
        Resource {
            kind: ResourceKind::Interrupt,
            name: PCI_DRIVER_NAME,
            start: grant.primary() as u64,
            len: 1,
        },
    ])
}
