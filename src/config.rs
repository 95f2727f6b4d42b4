//! Compile-time configuration for the Cadence GEM PCI wrapper.
//!
//! The wrapper has no runtime configuration surface: everything the MAC driver
//! expects (clock rates, device names, interrupt layout) is fixed here.

/// Name the PCI driver registers under
pub const PCI_DRIVER_NAME: &str = "macb_pci";
/// Name of the platform device handed to the MAC driver
pub const PLAT_DRIVER_NAME: &str = "macb";

/// Fixed-rate clock frequencies (Hz)
pub const GEM_PCLK_RATE: u32 = 50_000_000;
pub const GEM_HCLK_RATE: u32 = 50_000_000;
pub const GEM_TXCLK_RATE: u32 = 25_000_000;
pub const GEM_RXCLK_RATE: u32 = 25_000_000;
pub const GEM_TSUCLK_RATE: u32 = 300_000_000;

/// Number of message-signaled vectors requested per function
pub const MSI_VECTOR_COUNT: usize = 4;

/// Maximum number of clocks a single function owns (pclk, hclk, txclk, rxclk, tsuclk)
pub const MAX_CLOCKS: usize = 5;
/// Capacity of a clock name buffer
pub const CLOCK_NAME_CAPACITY: usize = 20;
/// Hex digits used for the per-instance clock name suffix
pub const CLOCK_NAME_SUFFIX_WIDTH: usize = 4;

/// Entries kept by the in-memory log ring
pub const LOG_RING_CAPACITY: usize = 256;
/// Level used when the host installs the logger without an explicit one
pub const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
