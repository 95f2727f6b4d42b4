// End-to-end attach/detach runs against the mock host

use alloc::string::String;
use alloc::vec::Vec;

use super::mock::{Event, MockHost};
use crate::bridge::{attach, PlatformDeviceHandle};
use crate::clocks::ClockRole;
use crate::config::{GEM_PCLK_RATE, GEM_TSUCLK_RATE, GEM_TXCLK_RATE, MSI_VECTOR_COUNT};
use crate::error::BridgeError;
use crate::irq::IrqMode;
use crate::pci::{
    FunctionAddress, PhysicalFunction, CDNS_DEVICE_ID, CDNS_VENDOR_ID, PCI_DEVICE_ID_GMAC_3P0,
    PCI_SUBDEVICE_ID_1000BASEX, PCI_SUBDEVICE_ID_SGMII, PCI_SUBDEVICE_ID_USXGMII,
    PCI_VENDOR_ID_PHYTIUM,
};
use crate::platform::{FirmwareNode, SoftwareProperty};
use crate::quirks::{DeviceType, MacbCaps, PhyInterfaceMode, FIXED_LINK_PROPERTY};
use crate::resources::ResourceKind;

fn cadence(addr: FunctionAddress) -> PhysicalFunction {
    PhysicalFunction::new(addr, CDNS_VENDOR_ID, CDNS_DEVICE_ID)
        .with_bar0(0xe000_0000, 0x4000)
        .with_legacy_irq(24)
}

fn phytium(addr: FunctionAddress, subsystem: u16) -> PhysicalFunction {
    PhysicalFunction::new(addr, PCI_VENDOR_ID_PHYTIUM, PCI_DEVICE_ID_GMAC_3P0)
        .with_subsystem(PCI_VENDOR_ID_PHYTIUM, subsystem)
        .with_bar0(0xe100_0000, 0x2000)
        .with_legacy_irq(25)
        .with_dma_mask(u64::MAX)
}

fn registered_clocks(journal: &[Event]) -> Vec<String> {
    journal
        .iter()
        .filter_map(|e| match e {
            Event::ClockRegistered(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn unregistered_clocks(journal: &[Event]) -> Vec<String> {
    journal
        .iter()
        .filter_map(|e| match e {
            Event::ClockUnregistered(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn clock_names(handle: &PlatformDeviceHandle) -> Vec<&str> {
    handle.clocks().iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn baseline_device_gets_two_clocks_and_no_quirk_data() {
    let host = MockHost::new();
    let func = cadence(FunctionAddress::new(0, 2, 0));

    let handle = attach(&host.services(), &func).unwrap();

    let res = handle.resources().as_slice();
    assert_eq!(res.len(), 2);
    assert_eq!(res[0].kind, ResourceKind::Memory);
    assert_eq!(res[0].start, 0xe000_0000);
    assert_eq!(res[1].kind, ResourceKind::Interrupt);

    assert_eq!(clock_names(&handle), ["pclk:0010", "hclk:0010"]);
    let data = handle.platform_data();
    assert_eq!(data.pclk.rate_hz, GEM_PCLK_RATE);
    assert!(data.quirk.is_none());
    assert_eq!(data.irq.mode(), IrqMode::Msi);
    assert_eq!(data.irq.vectors().len(), MSI_VECTOR_COUNT);

    let dev = host.device(handle.device()).unwrap();
    assert_eq!(dev.firmware_node, FirmwareNode::InheritParent);
    assert_eq!(dev.id, func.address.instance_id());
    assert!(host.is_master(func.address));

    handle.detach();
}

#[test]
fn sgmii_variant_gets_five_clocks_and_capabilities() {
    let host = MockHost::new();
    let func = phytium(FunctionAddress::new(3, 0, 0), PCI_SUBDEVICE_ID_SGMII);

    let handle = attach(&host.services(), &func).unwrap();

    assert_eq!(
        clock_names(&handle),
        ["pclk:0300", "hclk:0300", "txclk:0300", "rxclk:0300", "tsuclk:0300"]
    );

    let quirk = handle.platform_data().quirk.as_ref().unwrap();
    assert_eq!(quirk.dev_type, DeviceType::Phytium3p0);
    assert_eq!(
        quirk.caps,
        MacbCaps::GIGABIT_MODE_AVAILABLE
            | MacbCaps::JUMBO
            | MacbCaps::GEM_HAS_PTP
            | MacbCaps::BD_RD_PREFETCH
            | MacbCaps::USRIO_DISABLED
            | MacbCaps::TAILPTR
    );
    assert_eq!(quirk.phy_interface, PhyInterfaceMode::Sgmii);
    assert_eq!(quirk.fixed_link, None);
    let ext = quirk.clocks.as_ref().unwrap();
    assert_eq!(ext.txclk.rate_hz, GEM_TXCLK_RATE);
    assert_eq!(ext.tsuclk.rate_hz, GEM_TSUCLK_RATE);

    let dev = host.device(handle.device()).unwrap();
    assert_eq!(dev.firmware_node, FirmwareNode::InheritParent);

    handle.detach();
}

#[test]
fn base_x_variant_adds_a_forced_gigabit_link() {
    let host = MockHost::new();
    let sgmii = attach(&host.services(), &phytium(FunctionAddress::new(4, 0, 0), PCI_SUBDEVICE_ID_SGMII)).unwrap();
    let basex = attach(&host.services(), &phytium(FunctionAddress::new(4, 0, 1), PCI_SUBDEVICE_ID_1000BASEX)).unwrap();

    let a = sgmii.platform_data().quirk.as_ref().unwrap();
    let b = basex.platform_data().quirk.as_ref().unwrap();
    assert_eq!(a.caps, b.caps);
    assert_eq!(basex.clocks().len(), 5);

    let link = b.fixed_link.unwrap();
    assert_eq!(link.speed_mbps, 1000);
    assert!(link.full_duplex);
    assert!(link.autoneg_disabled());

    let dev = host.device(basex.device()).unwrap();
    assert_eq!(
        dev.firmware_node,
        FirmwareNode::Software(SoftwareProperty {
            name: FIXED_LINK_PROPERTY,
            cells: [0, 1, 1000, 1, 0],
        })
    );

    basex.detach();
    sgmii.detach();
}

#[test]
fn usxgmii_variant_runs_a_fixed_ten_gigabit_link() {
    let host = MockHost::new();
    let handle = attach(&host.services(), &phytium(FunctionAddress::new(5, 1, 0), PCI_SUBDEVICE_ID_USXGMII)).unwrap();

    let quirk = handle.platform_data().quirk.as_ref().unwrap();
    assert_eq!(quirk.phy_interface, PhyInterfaceMode::Usxgmii);
    assert_eq!(quirk.fixed_link.map(|l| l.speed_mbps), Some(10000));
    handle.detach();
}

#[test]
fn refused_msi_attaches_in_legacy_mode() {
    let host = MockHost::new();
    host.faults(|f| f.refuse_msi = true);
    let func = phytium(FunctionAddress::new(6, 0, 0), PCI_SUBDEVICE_ID_SGMII);

    let handle = attach(&host.services(), &func).unwrap();

    let irq = &handle.platform_data().irq;
    assert_eq!(irq.mode(), IrqMode::Legacy);
    assert_eq!(irq.vectors(), &[25]);
    assert_eq!(handle.resources().interrupt().start, 25);
    assert_eq!(host.granted_msi_functions(), 0);

    handle.detach();
    assert!(!host.journal().iter().any(|e| matches!(e, Event::MsiFreed(_))));
}

#[test]
fn clock_names_stay_unique_across_functions() {
    let host = MockHost::new();
    let services = host.services();
    let handles: Vec<PlatformDeviceHandle> = [
        FunctionAddress::new(1, 0, 0),
        FunctionAddress::new(1, 0, 1),
        FunctionAddress::new(2, 0, 0),
    ]
    .iter()
    .map(|&addr| attach(&services, &phytium(addr, PCI_SUBDEVICE_ID_SGMII)).unwrap())
    .collect();

    let mut names = host.clock_names();
    assert_eq!(names.len(), 15);
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 15);

    for handle in handles {
        handle.detach();
    }
    assert_eq!(host.live_clocks(), 0);
}

#[test]
fn detach_releases_in_reverse_attach_order() {
    let host = MockHost::new();
    let func = phytium(FunctionAddress::new(7, 3, 2), PCI_SUBDEVICE_ID_SGMII);
    let handle = attach(&host.services(), &func).unwrap();
    let device = handle.device();
    host.clear_journal();

    handle.detach();

    assert_eq!(
        host.journal(),
        [
            Event::DmaSet(device, None),
            Event::DeviceUnregistered(device),
            Event::ClockUnregistered("tsuclk:071a".into()),
            Event::ClockUnregistered("rxclk:071a".into()),
            Event::ClockUnregistered("txclk:071a".into()),
            Event::ClockUnregistered("hclk:071a".into()),
            Event::ClockUnregistered("pclk:071a".into()),
            Event::MsiFreed(func.address),
        ]
    );
    assert!(host.is_enabled(func.address));
}

#[test]
fn dma_context_follows_the_parent_function() {
    let host = MockHost::new();
    let services = host.services();
    let func = cadence(FunctionAddress::new(8, 0, 0));
    let handle = attach(&services, &func).unwrap();

    let dev = host.device(handle.device()).unwrap();
    assert_eq!(dev.dma, Some(services.pci.dma_context(func.address)));
    handle.detach();
}

/// One way to make an attach fail, and the error it should produce
struct FailurePoint {
    name: &'static str,
    inject: fn(&MockHost),
    function: fn() -> PhysicalFunction,
    check: fn(&BridgeError) -> bool,
}

fn failing_phytium() -> PhysicalFunction {
    phytium(FunctionAddress::new(0x20, 1, 0), PCI_SUBDEVICE_ID_SGMII)
}

fn clock_failure(host: &MockHost, role: ClockRole) {
    host.faults(|f| f.fail_clock_role = Some(role));
}

fn is_clock_failure(err: &BridgeError) -> bool {
    matches!(err, BridgeError::ClockRegistrationFailure { .. })
}

const FAILURE_POINTS: &[FailurePoint] = &[
    FailurePoint {
        name: "enable",
        inject: |h| h.faults(|f| f.enable = true),
        function: failing_phytium,
        check: |e| matches!(e, BridgeError::EnableFailure(_)),
    },
    FailurePoint {
        name: "interrupt grant",
        inject: |h| h.faults(|f| f.refuse_msi = true),
        function: || {
            let mut func = failing_phytium();
            func.legacy_irq = None;
            func
        },
        check: |e| *e == BridgeError::InterruptGrantFailure,
    },
    FailurePoint {
        name: "pclk",
        inject: |h| clock_failure(h, ClockRole::Pclk),
        function: failing_phytium,
        check: is_clock_failure,
    },
    FailurePoint {
        name: "hclk",
        inject: |h| clock_failure(h, ClockRole::Hclk),
        function: failing_phytium,
        check: is_clock_failure,
    },
    FailurePoint {
        name: "txclk",
        inject: |h| clock_failure(h, ClockRole::Txclk),
        function: failing_phytium,
        check: is_clock_failure,
    },
    FailurePoint {
        name: "rxclk",
        inject: |h| clock_failure(h, ClockRole::Rxclk),
        function: failing_phytium,
        check: is_clock_failure,
    },
    FailurePoint {
        name: "tsuclk",
        inject: |h| clock_failure(h, ClockRole::Tsuclk),
        function: failing_phytium,
        check: is_clock_failure,
    },
    FailurePoint {
        name: "platform registration",
        inject: |h| h.faults(|f| f.fail_platform = true),
        function: failing_phytium,
        check: |e| matches!(e, BridgeError::PlatformRegistrationFailure(_)),
    },
];

#[test]
fn every_failure_point_unwinds_without_leaks() {
    for point in FAILURE_POINTS {
        let host = MockHost::new();
        let services = host.services();

        // Something already attached, to make sure only this attempt is undone.
        let bystander = attach(&services, &cadence(FunctionAddress::new(0x10, 0, 0))).unwrap();
        let clocks_before = host.live_clocks();
        let msi_before = host.granted_msi_functions();
        let devices_before = host.live_devices();
        host.clear_journal();

        (point.inject)(&host);
        let func = (point.function)();
        let err = attach(&services, &func).unwrap_err();

        assert!((point.check)(&err), "{}: unexpected error {:?}", point.name, err);
        assert_eq!(host.live_clocks(), clocks_before, "{}: leaked clocks", point.name);
        assert_eq!(host.granted_msi_functions(), msi_before, "{}: leaked vectors", point.name);
        assert_eq!(host.live_devices(), devices_before, "{}: leaked device", point.name);
        assert_eq!(host.clocks_owned_by(func.address), 0, "{}", point.name);

        let journal = host.journal();
        let mut created = registered_clocks(&journal);
        created.reverse();
        assert_eq!(unregistered_clocks(&journal), created, "{}: release order", point.name);

        // The same function attaches cleanly once the fault is gone.
        host.faults(|f| *f = Default::default());
        attach(&services, &(point.function)())
            .unwrap_or_else(|e| panic!("{}: retry after clearing the fault failed: {:?}", point.name, e))
            .detach();
        bystander.detach();
        assert_eq!(host.live_clocks(), 0, "{}", point.name);
    }
}

#[test]
fn failed_attach_reports_a_stable_errno() {
    let host = MockHost::new();
    host.faults(|f| f.fail_clock_role = Some(ClockRole::Rxclk));

    let err = attach(&host.services(), &failing_phytium()).unwrap_err();
    assert_eq!(err.errno(), -12);

    let host = MockHost::new();
    let unknown = PhysicalFunction::new(FunctionAddress::new(0, 0, 0), 0x8086, 0x100e);
    let err = attach(&host.services(), &unknown).unwrap_err();
    assert_eq!(err.errno(), -19);
    assert!(host.journal().is_empty());
}
