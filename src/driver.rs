//! PCI driver entry and module lifecycle
//!
//! `module_init` registers the `macb_pci` driver with the host PCI core. The
//! host then calls [`PciDriver::probe`] for every function matching the id
//! table and [`PciDriver::remove`] when the function goes away. Each bound
//! function keeps its [`PlatformDeviceHandle`] in the driver's binding table
//! until it is removed or the module is unloaded.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::bridge::{self, PlatformDeviceHandle};
use crate::config::PCI_DRIVER_NAME;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{DriverRegistry, HostServices};
use crate::pci::{FunctionAddress, PciDeviceId, PhysicalFunction};
use crate::quirks::MATCH_TABLE;

/// Callbacks the host PCI core invokes on a registered driver
pub trait PciDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entries the host matches enumerated functions against
    fn id_table(&self) -> &'static [PciDeviceId];

    /// Bind to a function matching the id table
    fn probe(&self, function: &PhysicalFunction) -> BridgeResult<()>;

    /// Unbind from a previously probed function
    fn remove(&self, function: &PhysicalFunction) -> BridgeResult<()>;
}

/// Binding-table slot of one function
enum Binding {
    /// Attach in progress; the slot is reserved but nothing is attached yet
    Pending,
    Bound(PlatformDeviceHandle),
}

/// The Cadence GEM PCI wrapper driver
pub struct MacbPciDriver {
    host: HostServices,
    bound: Mutex<BTreeMap<FunctionAddress, Binding>>,
}

impl MacbPciDriver {
    pub fn new(host: HostServices) -> Self {
        Self {
            host,
            bound: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn is_bound(&self, function: FunctionAddress) -> bool {
        matches!(self.bound.lock().get(&function), Some(Binding::Bound(_)))
    }

    pub fn bound_functions(&self) -> Vec<FunctionAddress> {
        self.bound
            .lock()
            .iter()
            .filter(|(_, binding)| matches!(binding, Binding::Bound(_)))
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Detach every function still bound, in address order
    pub fn unbind_all(&self) -> usize {
        let handles: Vec<PlatformDeviceHandle> = {
            let mut bound = self.bound.lock();
            let mut handles = Vec::new();
            for (addr, binding) in core::mem::take(&mut *bound) {
                match binding {
                    Binding::Bound(handle) => handles.push(handle),
                    // An attach still in flight finishes on its own.
                    Binding::Pending => {
                        bound.insert(addr, Binding::Pending);
                    }
                }
            }
            handles
        };

        let count = handles.len();
        for handle in handles {
            log::warn!(target: "macb_pci", "{}: still bound at unload, detaching", handle.function());
            handle.detach();
        }
        count
    }
}

impl PciDriver for MacbPciDriver {
    fn name(&self) -> &'static str {
        PCI_DRIVER_NAME
    }

    fn id_table(&self) -> &'static [PciDeviceId] {
        &MATCH_TABLE
    }

    fn probe(&self, function: &PhysicalFunction) -> BridgeResult<()> {
        let addr = function.address;

        {
            let mut bound = self.bound.lock();
            if bound.contains_key(&addr) {
                log::warn!(target: "macb_pci", "{}: probe of an already bound function", addr);
                return Err(BridgeError::AlreadyBound(addr));
            }
            bound.insert(addr, Binding::Pending);
        }

        // The table is unlocked while attaching: registering the platform
        // device binds the MAC driver, which may call back into us.
        match bridge::attach(&self.host, function) {
            Ok(handle) => {
                self.bound.lock().insert(addr, Binding::Bound(handle));
                Ok(())
            }
            Err(e) => {
                self.bound.lock().remove(&addr);
                Err(e)
            }
        }
    }

    fn remove(&self, function: &PhysicalFunction) -> BridgeResult<()> {
        let addr = function.address;
        let handle = {
            let mut bound = self.bound.lock();
            match bound.remove(&addr) {
                Some(Binding::Bound(handle)) => handle,
                Some(Binding::Pending) => {
                    bound.insert(addr, Binding::Pending);
                    return Err(BridgeError::NotBound(addr));
                }
                None => return Err(BridgeError::NotBound(addr)),
            }
        };

        handle.detach();
        Ok(())
    }
}

impl fmt::Debug for MacbPciDriver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MacbPciDriver")
            .field("name", &PCI_DRIVER_NAME)
            .field("bound", &self.bound_functions())
            .finish()
    }
}

lazy_static! {
    /// The loaded driver instance, if any
    static ref MODULE: Mutex<Option<Arc<MacbPciDriver>>> = Mutex::new(None);
}

/// Module load entry point: register the driver with the host PCI core
pub fn module_init(registry: &dyn DriverRegistry, host: HostServices) -> BridgeResult<Arc<MacbPciDriver>> {
    let mut module = MODULE.lock();
    if module.is_some() {
        return Err(BridgeError::AlreadyLoaded);
    }

    let driver = Arc::new(MacbPciDriver::new(host));
    registry.register_driver(driver.clone()).map_err(|code| {
        log::error!(target: "macb_pci", "registering {} failed ({})", PCI_DRIVER_NAME, code);
        BridgeError::DriverRegistrationFailure(code)
    })?;

    log::info!(target: "macb_pci", "{} registered ({} id table entries)", PCI_DRIVER_NAME, MATCH_TABLE.len());
    *module = Some(driver.clone());
    Ok(driver)
}

/// Module unload entry point: unregister the driver and detach leftovers
pub fn module_exit(registry: &dyn DriverRegistry) -> BridgeResult<()> {
    let driver = MODULE.lock().take().ok_or(BridgeError::NotLoaded)?;

    registry.unregister_driver(driver.name());
    let leftovers = driver.unbind_all();
    log::info!(target: "macb_pci", "{} unregistered, {} function(s) released", PCI_DRIVER_NAME, leftovers);
    Ok(())
}

/// The loaded driver instance, if the module is loaded
pub fn loaded_driver() -> Option<Arc<MacbPciDriver>> {
    MODULE.lock().clone()
}
