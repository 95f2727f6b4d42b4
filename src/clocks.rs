//! Fixed-rate clock provisioning
//!
//! The MAC driver looks its clocks up by name, so every function gets its own
//! set: the role prefix plus the function's instance id in fixed-width hex
//! (`pclk:0a19`). Two attached functions can therefore never collide, and no
//! shared counter is needed.
//!
//! Every registered clock is held by a [`FixedClock`] guard. A provisioning
//! call stacks its guards and unregisters them in reverse creation order if a
//! later registration fails, so a partial set never escapes this module.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{self, Write};

use crate::config::{
    CLOCK_NAME_CAPACITY, CLOCK_NAME_SUFFIX_WIDTH, GEM_HCLK_RATE, MAX_CLOCKS, GEM_PCLK_RATE, GEM_RXCLK_RATE,
    GEM_TSUCLK_RATE, GEM_TXCLK_RATE,
};
use crate::error::{BridgeError, BridgeResult, ClockError};
use crate::host::{ClockId, ClockTree};
use crate::pci::{FunctionAddress, PhysicalFunction};
use crate::quirks::CapabilityDescriptor;

pub type ClockName = heapless::String<CLOCK_NAME_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockRole {
    Pclk,
    Hclk,
    Txclk,
    Rxclk,
    Tsuclk,
}

impl ClockRole {
    pub fn prefix(self) -> &'static str {
        match self {
            ClockRole::Pclk => "pclk",
            ClockRole::Hclk => "hclk",
            ClockRole::Txclk => "txclk",
            ClockRole::Rxclk => "rxclk",
            ClockRole::Tsuclk => "tsuclk",
        }
    }

    pub fn rate_hz(self) -> u32 {
        match self {
            ClockRole::Pclk => GEM_PCLK_RATE,
            ClockRole::Hclk => GEM_HCLK_RATE,
            ClockRole::Txclk => GEM_TXCLK_RATE,
            ClockRole::Rxclk => GEM_RXCLK_RATE,
            ClockRole::Tsuclk => GEM_TSUCLK_RATE,
        }
    }
}

impl fmt::Display for ClockRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Registration order of the clocks every function gets
pub const BASELINE_ROLES: [ClockRole; 2] = [ClockRole::Pclk, ClockRole::Hclk];
/// Registration order of the quirk-specific clocks
pub const EXTENDED_ROLES: [ClockRole; 3] = [ClockRole::Txclk, ClockRole::Rxclk, ClockRole::Tsuclk];

/// Per-instance clock name, e.g. `hclk:0a19`
pub fn clock_name(role: ClockRole, owner: FunctionAddress) -> Result<ClockName, ClockError> {
    let mut name = ClockName::new();
    write!(
        name,
        "{}:{:0width$x}",
        role.prefix(),
        owner.instance_id(),
        width = CLOCK_NAME_SUFFIX_WIDTH
    )
    .map_err(|_| ClockError::NameTooLong)?;
    Ok(name)
}

/// What the MAC driver is told about one clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockRef {
    pub id: ClockId,
    pub role: ClockRole,
    pub name: ClockName,
    pub rate_hz: u32,
}

/// A registered fixed-rate clock; unregistered when dropped
pub struct FixedClock {
    info: ClockRef,
    tree: Arc<dyn ClockTree>,
}

impl FixedClock {
    fn register(tree: &Arc<dyn ClockTree>, owner: FunctionAddress, role: ClockRole) -> BridgeResult<Self> {
        let name = clock_name(role, owner).map_err(|cause| BridgeError::ClockRegistrationFailure {
            name: ClockName::new(),
            cause,
        })?;

        match tree.register_fixed_rate(owner, &name, role.rate_hz()) {
            Ok(id) => {
                log::trace!(target: "macb_pci", "{}: registered {} ({} Hz)", owner, name, role.rate_hz());
                Ok(Self {
                    info: ClockRef {
                        id,
                        role,
                        name,
                        rate_hz: role.rate_hz(),
                    },
                    tree: tree.clone(),
                })
            }
            Err(cause) => {
                log::error!(target: "macb_pci", "{}: failed to register {}: {}", owner, name, cause);
                Err(BridgeError::ClockRegistrationFailure { name, cause })
            }
        }
    }

    pub fn info(&self) -> &ClockRef {
        &self.info
    }
}

impl Drop for FixedClock {
    fn drop(&mut self) {
        log::trace!(target: "macb_pci", "unregistering {}", self.info.name);
        self.tree.unregister_clock(self.info.id);
    }
}

impl fmt::Debug for FixedClock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("FixedClock").field(&self.info).finish()
    }
}

/// Clocks from one provisioning call, released newest first
#[derive(Debug)]
struct ClockStack<const N: usize> {
    clocks: heapless::Vec<FixedClock, N>,
}

impl<const N: usize> ClockStack<N> {
    fn provision(
        tree: &Arc<dyn ClockTree>,
        owner: FunctionAddress,
        roles: &[ClockRole; N],
    ) -> BridgeResult<Self> {
        let mut stack = Self {
            clocks: heapless::Vec::new(),
        };

        for &role in roles.iter() {
            let clock = FixedClock::register(tree, owner, role)?;
            stack.clocks.push(clock).map_err(|clock| BridgeError::ClockRegistrationFailure {
                name: clock.info.name.clone(),
                cause: ClockError::OutOfMemory,
            })?;
        }

        Ok(stack)
    }

    fn get(&self, index: usize) -> &ClockRef {
        &self.clocks[index].info
    }
}

impl<const N: usize> Drop for ClockStack<N> {
    fn drop(&mut self) {
        while let Some(clock) = self.clocks.pop() {
            drop(clock);
        }
    }
}

/// `pclk` and `hclk`
#[derive(Debug)]
pub struct BaselineClocks(ClockStack<2>);

impl BaselineClocks {
    pub fn pclk(&self) -> &ClockRef {
        self.0.get(0)
    }

    pub fn hclk(&self) -> &ClockRef {
        self.0.get(1)
    }
}

/// `txclk`, `rxclk` and `tsuclk`
#[derive(Debug)]
pub struct ExtendedClocks(ClockStack<3>);

impl ExtendedClocks {
    pub fn txclk(&self) -> &ClockRef {
        self.0.get(0)
    }

    pub fn rxclk(&self) -> &ClockRef {
        self.0.get(1)
    }

    pub fn tsuclk(&self) -> &ClockRef {
        self.0.get(2)
    }
}

/// Register pclk then hclk for the function
pub fn provision_baseline(
    tree: &Arc<dyn ClockTree>,
    function: &PhysicalFunction,
) -> BridgeResult<BaselineClocks> {
    ClockStack::provision(tree, function.address, &BASELINE_ROLES).map(BaselineClocks)
}

/// Register txclk, rxclk then tsuclk for a quirk variant that needs them
pub fn provision_extended(
    tree: &Arc<dyn ClockTree>,
    function: &PhysicalFunction,
    descriptor: &CapabilityDescriptor,
) -> BridgeResult<ExtendedClocks> {
    log::debug!(target: "macb_pci", "{}: provisioning {:?} clocks", function.address, descriptor.dev_type);
    ClockStack::provision(tree, function.address, &EXTENDED_ROLES).map(ExtendedClocks)
}

/// Every clock owned by one attached function.
///
/// Dropping the set releases the extended triple before the baseline pair,
/// each newest first.
#[derive(Debug)]
pub struct ClockSet {
    // Field order is release order.
    extended: Option<ExtendedClocks>,
    baseline: BaselineClocks,
}

impl ClockSet {
    pub fn new(baseline: BaselineClocks, extended: Option<ExtendedClocks>) -> Self {
        Self { extended, baseline }
    }

    pub fn baseline(&self) -> &BaselineClocks {
        &self.baseline
    }

    pub fn extended(&self) -> Option<&ExtendedClocks> {
        self.extended.as_ref()
    }

    /// Clocks in creation order
    pub fn clocks(&self) -> Vec<&ClockRef> {
        let mut all = Vec::with_capacity(MAX_CLOCKS);
        all.push(self.baseline.pclk());
        all.push(self.baseline.hclk());
        if let Some(ext) = &self.extended {
            all.push(ext.txclk());
            all.push(ext.rxclk());
            all.push(ext.tsuclk());
        }
        all
    }

    pub fn len(&self) -> usize {
        if self.extended.is_some() { 5 } else { 2 }
    }

    pub fn into_parts(self) -> (BaselineClocks, Option<ExtendedClocks>) {
        (self.baseline, self.extended)
    }

    /// Release the extended triple, then the baseline pair
    pub fn release(self) {
        let (baseline, extended) = self.into_parts();
        drop(extended);
        drop(baseline);
    }
}
