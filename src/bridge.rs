//! Attach/detach state machine
//!
//! `attach` walks a PCI function through
//!
//! ```text
//! Idle -> Enabled -> ResourcesBuilt -> BaselineClocksProvisioned
//!      [-> ExtendedClocksProvisioned] -> Registered -> Attached
//! ```
//!
//! holding one guard per completed stage. When a stage fails the guards fall
//! out of scope before the error is returned, which releases exactly what was
//! acquired, newest first. Only a fully attached function yields a
//! [`PlatformDeviceHandle`]; `detach` consumes it and walks the stages back.

use core::fmt;

use crate::clocks::{self, ClockRef, ClockSet};
use crate::config::PLAT_DRIVER_NAME;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostServices, PlatformDeviceId};
use crate::irq::{self, IrqAllocation, IrqGrant};
use crate::pci::{FunctionAddress, PhysicalFunction};
use crate::platform::{FirmwareNode, PlatformData, PlatformDeviceInfo, Registration};
use crate::quirks::{self, CapabilityDescriptor};
use crate::resources::{self, BridgeResourceSet};

/// Stage reached by an attach or detach in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Enabled,
    ResourcesBuilt,
    BaselineClocksProvisioned,
    ExtendedClocksProvisioned,
    Registered,
    Attached,
    Detaching,
    Detached,
}

impl BridgeState {
    /// Whether `next` directly follows this state on the attach or teardown path
    pub fn can_advance_to(self, next: BridgeState) -> bool {
        use BridgeState::*;

        matches!(
            (self, next),
            (Idle, Enabled)
                | (Enabled, ResourcesBuilt)
                | (ResourcesBuilt, BaselineClocksProvisioned)
                | (BaselineClocksProvisioned, ExtendedClocksProvisioned)
                | (BaselineClocksProvisioned, Registered)
                | (ExtendedClocksProvisioned, Registered)
                | (Registered, Attached)
                | (Attached, Detaching)
                | (Detaching, ExtendedClocksProvisioned)
                | (Detaching, BaselineClocksProvisioned)
                | (ExtendedClocksProvisioned, BaselineClocksProvisioned)
                | (BaselineClocksProvisioned, ResourcesBuilt)
                | (ResourcesBuilt, Detached)
        )
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BridgeState::Idle => "idle",
            BridgeState::Enabled => "enabled",
            BridgeState::ResourcesBuilt => "resources built",
            BridgeState::BaselineClocksProvisioned => "baseline clocks",
            BridgeState::ExtendedClocksProvisioned => "extended clocks",
            BridgeState::Registered => "registered",
            BridgeState::Attached => "attached",
            BridgeState::Detaching => "detaching",
            BridgeState::Detached => "detached",
        };
        write!(f, "{}", name)
    }
}

struct Progress {
    function: FunctionAddress,
    state: BridgeState,
}

impl Progress {
    fn new(function: FunctionAddress, state: BridgeState) -> Self {
        Self { function, state }
    }

    fn advance(&mut self, next: BridgeState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal bridge transition {:?} -> {:?}",
            self.state,
            next
        );
        log::trace!(target: "macb_pci", "{}: {} -> {}", self.function, self.state, next);
        self.state = next;
    }
}

/// A PCI function bridged to a registered `macb` platform device.
///
/// Owns every resource the attach acquired. Dropping the handle tears them
/// down in the same order as [`PlatformDeviceHandle::detach`], without the
/// state logging.
pub struct PlatformDeviceHandle {
    // Field order is teardown order.
    registration: Registration,
    clocks: ClockSet,
    irq: IrqAllocation,
    function: FunctionAddress,
    descriptor: Option<&'static CapabilityDescriptor>,
    resources: BridgeResourceSet,
    platform_data: PlatformData,
}

impl PlatformDeviceHandle {
    pub fn function(&self) -> FunctionAddress {
        self.function
    }

    /// Quirk descriptor resolved at attach time, `None` for a baseline device
    pub fn descriptor(&self) -> Option<&'static CapabilityDescriptor> {
        self.descriptor
    }

    pub fn device(&self) -> PlatformDeviceId {
        self.registration.device()
    }

    pub fn resources(&self) -> &BridgeResourceSet {
        &self.resources
    }

    pub fn platform_data(&self) -> &PlatformData {
        &self.platform_data
    }

    pub fn irq(&self) -> &IrqGrant {
        self.irq.grant()
    }

    /// Clocks in creation order
    pub fn clocks(&self) -> alloc::vec::Vec<&ClockRef> {
        self.clocks.clocks()
    }

    /// Tear the bridge down in reverse attach order.
    ///
    /// The PCI function itself stays enabled; disabling it is up to the host.
    pub fn detach(self) {
        let PlatformDeviceHandle {
            registration,
            clocks,
            irq,
            function,
            ..
        } = self;
        let mut progress = Progress::new(function, BridgeState::Attached);
        progress.advance(BridgeState::Detaching);

        drop(registration);

        let (baseline, extended) = clocks.into_parts();
        if let Some(extended) = extended {
            progress.advance(BridgeState::ExtendedClocksProvisioned);
            drop(extended);
        }
        progress.advance(BridgeState::BaselineClocksProvisioned);

        drop(baseline);
        progress.advance(BridgeState::ResourcesBuilt);

        drop(irq);
        progress.advance(BridgeState::Detached);

        log::info!(target: "macb_pci", "{}: detached", function);
    }
}

impl fmt::Debug for PlatformDeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PlatformDeviceHandle")
            .field("function", &self.function)
            .field("device", &self.registration.device())
            .field("descriptor", &self.descriptor.map(|d| d.dev_type))
            .field("clocks", &self.clocks.len())
            .field("irq", self.irq.grant())
            .finish()
    }
}

/// Bridge a PCI function to a platform device.
///
/// On error every stage completed so far has already been undone.
pub fn attach(host: &HostServices, function: &PhysicalFunction) -> BridgeResult<PlatformDeviceHandle> {
    let mut progress = Progress::new(function.address, BridgeState::Idle);

    attach_stages(host, function, &mut progress).map_err(|e| {
        log::error!(target: "macb_pci", "{}: attach aborted after {}: {}", function.address, progress.state, e);
        e
    })
}

fn attach_stages(
    host: &HostServices,
    function: &PhysicalFunction,
    progress: &mut Progress,
) -> BridgeResult<PlatformDeviceHandle> {
    let addr = function.address;
    if !addr.is_valid() {
        return Err(BridgeError::InvalidAddress(addr));
    }

    let descriptor = quirks::resolve_function(function)?;

    host.pci
        .enable_device(addr)
        .map_err(BridgeError::EnableFailure)?;
    host.pci.set_master(addr);
    progress.advance(BridgeState::Enabled);

    let irq = irq::allocate(&host.pci, function)?;
    let resources = resources::translate(function, irq.grant());
    progress.advance(BridgeState::ResourcesBuilt);

    let baseline = clocks::provision_baseline(&host.clocks, function)?;
    progress.advance(BridgeState::BaselineClocksProvisioned);

    let extended = match descriptor {
        Some(desc) if desc.needs_extended_clocks() => {
            let extended = clocks::provision_extended(&host.clocks, function, desc)?;
            progress.advance(BridgeState::ExtendedClocksProvisioned);
            Some(extended)
        }
        _ => None,
    };
    let clocks = ClockSet::new(baseline, extended);

    let platform_data = PlatformData::new(&clocks, irq.grant(), descriptor);
    let info = PlatformDeviceInfo {
        parent: addr,
        name: PLAT_DRIVER_NAME,
        id: addr.instance_id(),
        resources: &resources,
        data: &platform_data,
        dma_mask: function.dma_mask,
        firmware_node: FirmwareNode::for_descriptor(descriptor),
    };
    let mut registration = Registration::register(&host.platform, &info)?;
    progress.advance(BridgeState::Registered);

    registration.propagate_dma(host.pci.dma_context(addr));
    progress.advance(BridgeState::Attached);

    log::info!(target: "macb_pci", "{}: EMAC physical base addr: {:#x}", addr, resources.memory().start);
    log::info!(target: "macb_pci",
        "{}: attached {}.{:04x} ({} clocks, {} {:?})",
        addr, PLAT_DRIVER_NAME, addr.instance_id(), clocks.len(),
        irq.grant().mode(), irq.grant().vectors());

    Ok(PlatformDeviceHandle {
        registration,
        clocks,
        irq,
        function: addr,
        descriptor,
        resources,
        platform_data,
    })
}
