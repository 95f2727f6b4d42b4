//! Interrupt vector allocation
//!
//! Each function asks for [`MSI_VECTOR_COUNT`] message-signaled vectors. If the
//! interrupt controller cannot grant exactly that many, the function falls back
//! once to its pre-assigned legacy line. There is no retry loop.

use alloc::sync::Arc;
use core::fmt;

use crate::config::MSI_VECTOR_COUNT;
use crate::error::{BridgeError, BridgeResult};
use crate::host::PciBus;
use crate::pci::{FunctionAddress, PhysicalFunction};

/// Interrupt numbers granted to one function
pub type IrqVectors = heapless::Vec<u32, MSI_VECTOR_COUNT>;

/// How the function's interrupts are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqMode {
    Msi,
    Legacy,
}

impl fmt::Display for IrqMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IrqMode::Msi => write!(f, "MSI"),
            IrqMode::Legacy => write!(f, "INTx"),
        }
    }
}

/// Mode and vector list recorded in the platform data
///
/// Always holds at least one vector: four in MSI mode, one in legacy mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqGrant {
    mode: IrqMode,
    vectors: IrqVectors,
}

impl IrqGrant {
    pub fn mode(&self) -> IrqMode {
        self.mode
    }

    pub fn vectors(&self) -> &[u32] {
        &self.vectors
    }

    /// Vector 0 (MSI) or the legacy line; the only one a baseline MAC uses
    pub fn primary(&self) -> u32 {
        self.vectors[0]
    }
}

/// Interrupt grant owned by an attach in progress or by a handle.
///
/// Dropping it releases MSI vectors. A legacy line belongs to the function and
/// is left alone.
pub struct IrqAllocation {
    grant: IrqGrant,
    function: FunctionAddress,
    pci: Arc<dyn PciBus>,
}

impl IrqAllocation {
    pub fn grant(&self) -> &IrqGrant {
        &self.grant
    }
}

impl Drop for IrqAllocation {
    fn drop(&mut self) {
        if self.grant.mode == IrqMode::Msi {
            log::debug!(target: "macb_pci", "{}: releasing {} MSI vectors", self.function, self.grant.vectors.len());
            self.pci.free_irq_vectors(self.function);
        }
    }
}

impl fmt::Debug for IrqAllocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("IrqAllocation")
            .field("function", &self.function)
            .field("grant", &self.grant)
            .finish()
    }
}

/// Request MSI vectors, falling back to the legacy line.
///
/// Fails only when MSI is refused and the function has no legacy line either.
pub fn allocate(pci: &Arc<dyn PciBus>, function: &PhysicalFunction) -> BridgeResult<IrqAllocation> {
    let addr = function.address;

    let grant = match pci.alloc_msi_vectors(addr, MSI_VECTOR_COUNT) {
        Ok(vectors) if vectors.len() == MSI_VECTOR_COUNT => IrqGrant {
            mode: IrqMode::Msi,
            vectors,
        },
        Ok(vectors) => {
            log::warn!(target: "macb_pci",
                "{}: got {} of {} MSI vectors, falling back to INTx",
                addr, vectors.len(), MSI_VECTOR_COUNT);
            pci.free_irq_vectors(addr);
            legacy_grant(function)?
        }
        Err(e) => {
            log::warn!(target: "macb_pci", "{}: failed to allocate MSI entries ({}), falling back to INTx", addr, e);
            legacy_grant(function)?
        }
    };

    log::debug!(target: "macb_pci", "{}: interrupts {} {:?}", addr, grant.mode, grant.vectors());

    Ok(IrqAllocation {
        grant,
        function: addr,
        pci: pci.clone(),
    })
}

fn legacy_grant(function: &PhysicalFunction) -> BridgeResult<IrqGrant> {
    let line = function.legacy_irq.ok_or_else(|| {
        log::error!(target: "macb_pci", "{}: no legacy interrupt line assigned", function.address);
        BridgeError::InterruptGrantFailure
    })?;

    let mut vectors = IrqVectors::new();
    vectors
        .push(line)
        .map_err(|_| BridgeError::InterruptGrantFailure)?;

    Ok(IrqGrant {
        mode: IrqMode::Legacy,
        vectors,
    })
}
