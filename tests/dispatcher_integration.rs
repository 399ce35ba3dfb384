//! End-to-end tests that exercise `BootSlotDispatcher` over
//! `SystemRunner` against real (mock) subprocesses, rather than the
//! in-memory `FakeRunner` the unit tests use: a mock tool is substituted
//! via `$PATH`, with no compile-time wiring into the crate under test.

use bootslot_core::{
    BootLoaderName, BootSlotDispatcher, Slot, SlotClass, SlotRegistry, SystemConfig,
};
use bootslot_core::test_utils::MockToolchain;

fn rootfs_slot(name: &str, bootname: &str) -> Slot {
    Slot {
        name: name.to_string(),
        bootname: Some(bootname.to_string()),
        class: SlotClass::Rootfs,
        device: format!("/dev/{name}"),
        readonly: false,
    }
}

#[test]
fn barebox_get_primary_over_real_mock_tool() {
    let mocks = MockToolchain::new();
    mocks.seed(
        &mocks.barebox_state_path(),
        "bootstate.system0.priority=20\n\
         bootstate.system0.remaining_attempts=3\n\
         bootstate.system1.priority=10\n\
         bootstate.system1.remaining_attempts=3\n",
    );

    let registry = SlotRegistry::new(vec![
        rootfs_slot("rootfs.0", "system0"),
        rootfs_slot("rootfs.1", "system1"),
    ]);
    let config = SystemConfig {
        bootloader: BootLoaderName::Barebox,
        grubenv_path: None,
        max_attempts: 3,
    };
    let dispatcher = BootSlotDispatcher::new(&registry, &config).unwrap();

    let primary = dispatcher.get_primary().unwrap();
    assert_eq!(primary.name, "rootfs.0");
}

#[test]
fn barebox_set_state_false_then_get_state_is_false() {
    let mocks = MockToolchain::new();
    mocks.seed(
        &mocks.barebox_state_path(),
        "bootstate.system0.priority=20\n\
         bootstate.system0.remaining_attempts=3\n",
    );

    let registry = SlotRegistry::new(vec![rootfs_slot("rootfs.0", "system0")]);
    let config = SystemConfig {
        bootloader: BootLoaderName::Barebox,
        grubenv_path: None,
        max_attempts: 3,
    };
    let dispatcher = BootSlotDispatcher::new(&registry, &config).unwrap();
    let slot = registry.by_name("rootfs.0").unwrap();

    assert!(dispatcher.get_state(slot).unwrap());
    dispatcher.set_state(slot, false).unwrap();
    assert!(!dispatcher.get_state(slot).unwrap());

    let state = mocks.read(&mocks.barebox_state_path());
    assert!(state.contains("bootstate.system0.priority=0"));
    assert!(state.contains("bootstate.system0.remaining_attempts=0"));
}

#[test]
fn uboot_set_primary_reorders_boot_order_on_disk() {
    let mocks = MockToolchain::new();
    mocks.seed(
        &mocks.uboot_state_path(),
        "BOOT_ORDER=A B\nBOOT_A_LEFT=0\nBOOT_B_LEFT=0\n",
    );

    let registry = SlotRegistry::new(vec![
        rootfs_slot("rootfs.0", "A"),
        rootfs_slot("rootfs.1", "B"),
    ]);
    let config = SystemConfig {
        bootloader: BootLoaderName::Uboot,
        grubenv_path: None,
        max_attempts: 3,
    };
    let dispatcher = BootSlotDispatcher::new(&registry, &config).unwrap();

    // Both slots start bad (S6 pre-state).
    assert!(!dispatcher.get_state(registry.by_name("rootfs.0").unwrap()).unwrap());
    assert!(!dispatcher.get_state(registry.by_name("rootfs.1").unwrap()).unwrap());

    dispatcher
        .set_primary(registry.by_name("rootfs.1").unwrap())
        .unwrap();

    let state = mocks.read(&mocks.uboot_state_path());
    assert!(state.contains("BOOT_ORDER=B A"));
    assert!(state.contains("BOOT_B_LEFT=3"));
    assert!(state.contains("BOOT_A_LEFT=0"));
}

#[test]
fn grub_set_state_roundtrip_over_real_mock_tool() {
    let mocks = MockToolchain::new();
    let grubenv = mocks.grubenv_path();
    mocks.seed(&grubenv, "ORDER=A B\nA_OK=0\nA_TRY=0\nB_OK=1\nB_TRY=0\n");

    let registry = SlotRegistry::new(vec![
        rootfs_slot("rootfs.0", "A"),
        rootfs_slot("rootfs.1", "B"),
    ]);
    let config = SystemConfig {
        bootloader: BootLoaderName::Grub,
        grubenv_path: Some(grubenv.clone()),
        max_attempts: 3,
    };
    let dispatcher = BootSlotDispatcher::new(&registry, &config).unwrap();
    let slot_a = registry.by_name("rootfs.0").unwrap();

    assert!(!dispatcher.get_state(slot_a).unwrap());
    dispatcher.set_state(slot_a, true).unwrap();
    assert!(dispatcher.get_state(slot_a).unwrap());

    let state = mocks.read(&grubenv);
    assert!(state.contains("A_OK=1"));
    assert!(state.contains("A_TRY=0"));
}
