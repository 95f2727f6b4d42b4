// macb-pci error handling
// Host subsystem failures and the stable categories reported back to the bus manager

use core::fmt;

use crate::clocks::ClockName;
use crate::pci::FunctionAddress;

/// Linux-compatible errno values the bus manager understands
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EEXIST: i32 = 17;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOSPC: i32 = 28;
}

/// Failure reported by the host PCI subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciError {
    /// The function could not be brought into D0 / memory decoding enabled
    EnableFailed(i32),
    /// The interrupt controller could not grant the requested vectors
    VectorsUnavailable(i32),
}

impl fmt::Display for PciError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PciError::EnableFailed(code) => write!(f, "PCI enable failed ({})", code),
            PciError::VectorsUnavailable(code) => write!(f, "MSI vectors unavailable ({})", code),
        }
    }
}

/// Failure reported by the host clock framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// A clock with the same name is already registered
    NameInUse,
    /// The clock framework ran out of memory
    OutOfMemory,
    /// The clock name does not fit the name buffer
    NameTooLong,
    /// Any other host-specific failure
    Other(i32),
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClockError::NameInUse => write!(f, "clock name already registered"),
            ClockError::OutOfMemory => write!(f, "out of memory"),
            ClockError::NameTooLong => write!(f, "clock name too long"),
            ClockError::Other(code) => write!(f, "clock framework error ({})", code),
        }
    }
}

/// Failure reported by the host platform bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    /// A device with the same name and id already exists
    AlreadyExists,
    /// The device model ran out of memory
    OutOfMemory,
    /// Any other host-specific failure
    Other(i32),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlatformError::AlreadyExists => write!(f, "platform device already exists"),
            PlatformError::OutOfMemory => write!(f, "out of memory"),
            PlatformError::Other(code) => write!(f, "platform bus error ({})", code),
        }
    }
}

/// Stable error category returned to the host bus manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCategory {
    Io,
    NoSpace,
    NoMemory,
    InvalidArgument,
    NoDevice,
    Busy,
    NotFound,
    Exists,
}

impl ErrorCategory {
    /// Negative errno reported for this category
    pub fn errno(self) -> i32 {
        -match self {
            ErrorCategory::Io => errno::EIO,
            ErrorCategory::NoSpace => errno::ENOSPC,
            ErrorCategory::NoMemory => errno::ENOMEM,
            ErrorCategory::InvalidArgument => errno::EINVAL,
            ErrorCategory::NoDevice => errno::ENODEV,
            ErrorCategory::Busy => errno::EBUSY,
            ErrorCategory::NotFound => errno::ENOENT,
            ErrorCategory::Exists => errno::EEXIST,
        }
    }
}

/// Errors surfaced by attach, detach and the driver module entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Slot or function number out of range for a PCI address
    InvalidAddress(FunctionAddress),
    /// PCI function could not be enabled; nothing was touched
    EnableFailure(PciError),
    /// Neither MSI vectors nor a legacy line could be obtained
    InterruptGrantFailure,
    /// A fixed-rate clock could not be registered
    ClockRegistrationFailure {
        name: ClockName,
        cause: ClockError,
    },
    /// A partner-vendor function has no matching quirk entry
    DescriptorMismatch {
        vendor_id: u16,
        device_id: u16,
        subsystem_vendor_id: Option<u16>,
        subsystem_device_id: Option<u16>,
    },
    /// The platform device could not be registered
    PlatformRegistrationFailure(PlatformError),
    /// The vendor/device pair is not claimed by this driver
    UnsupportedDevice { vendor_id: u16, device_id: u16 },
    /// The function already has a platform device bound
    AlreadyBound(FunctionAddress),
    /// The function has no platform device bound
    NotBound(FunctionAddress),
    /// The driver module is already loaded
    AlreadyLoaded,
    /// The driver module is not loaded
    NotLoaded,
    /// The host refused the PCI driver registration
    DriverRegistrationFailure(i32),
}

impl BridgeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::InvalidAddress(_) => ErrorCategory::InvalidArgument,
            BridgeError::EnableFailure(_) => ErrorCategory::Io,
            BridgeError::InterruptGrantFailure => ErrorCategory::NoSpace,
            BridgeError::ClockRegistrationFailure { .. } => ErrorCategory::NoMemory,
            BridgeError::DescriptorMismatch { .. } => ErrorCategory::InvalidArgument,
            BridgeError::PlatformRegistrationFailure(_) => ErrorCategory::NoMemory,
            BridgeError::UnsupportedDevice { .. } => ErrorCategory::NoDevice,
            BridgeError::AlreadyBound(_) => ErrorCategory::Busy,
            BridgeError::NotBound(_) => ErrorCategory::NotFound,
            BridgeError::AlreadyLoaded => ErrorCategory::Exists,
            BridgeError::NotLoaded => ErrorCategory::NotFound,
            BridgeError::DriverRegistrationFailure(_) => ErrorCategory::Io,
        }
    }

    /// Negative result handed back to the bus manager
    pub fn errno(&self) -> i32 {
        self.category().errno()
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::InvalidAddress(addr) => write!(f, "Invalid PCI address {}", addr),
            BridgeError::EnableFailure(e) => write!(f, "Enabling PCI device has failed: {}", e),
            BridgeError::InterruptGrantFailure => write!(f, "No MSI vectors and no legacy interrupt line"),
            BridgeError::ClockRegistrationFailure { name, cause } => {
                write!(f, "Registering clock {} failed: {}", name, cause)
            }
            BridgeError::DescriptorMismatch {
                vendor_id,
                device_id,
                subsystem_vendor_id,
                subsystem_device_id,
            } => {
                write!(f, "No quirk data for {:04x}:{:04x}", vendor_id, device_id)?;
                match (subsystem_vendor_id, subsystem_device_id) {
                    (Some(sv), Some(sd)) => write!(f, " (subsystem {:04x}:{:04x})", sv, sd),
                    _ => write!(f, " (no subsystem id)"),
                }
            }
            BridgeError::PlatformRegistrationFailure(e) => {
                write!(f, "Registering platform device failed: {}", e)
            }
            BridgeError::UnsupportedDevice { vendor_id, device_id } => {
                write!(f, "Device {:04x}:{:04x} is not handled by this driver", vendor_id, device_id)
            }
            BridgeError::AlreadyBound(addr) => write!(f, "{} is already bound", addr),
            BridgeError::NotBound(addr) => write!(f, "{} is not bound", addr),
            BridgeError::AlreadyLoaded => write!(f, "Driver module already loaded"),
            BridgeError::NotLoaded => write!(f, "Driver module not loaded"),
            BridgeError::DriverRegistrationFailure(code) => {
                write!(f, "PCI driver registration refused ({})", code)
            }
        }
    }
}

/// Result type used throughout the bridge
pub type BridgeResult<T> = Result<T, BridgeError>;
