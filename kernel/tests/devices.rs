//! Device bridge: clock ticks and I/O completions delivered to waiters.

use mailbox_kernel::{
    devices::{DeviceKind, SimulatedDevices},
    process::ThreadScheduler,
    BlockReason, IpcError, MailboxConfig, MailboxKind, Messaging, Scheduler,
};
use std::sync::Arc;

type Kernel = Messaging<Arc<ThreadScheduler>>;

fn boot(devices: &SimulatedDevices) -> (Arc<ThreadScheduler>, Arc<Kernel>) {
    mailbox_kernel::logger::init();
    let sched = Arc::new(ThreadScheduler::new());
    let kernel = Messaging::start(MailboxConfig::default(), Arc::clone(&sched), devices).unwrap();
    (sched, Arc::new(kernel))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_default()
}

#[test]
fn test_standard_catalogue() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    let bridge = kernel.devices();

    let names: Vec<_> = bridge.device_names().collect();
    assert_eq!(
        names,
        ["clock", "disk0", "disk1", "term0", "term1", "term2", "term3"]
    );
    assert_eq!(kernel.mailboxes().in_use(), 7);

    let clock = bridge.mailbox_of("clock").unwrap();
    assert_eq!(kernel.mailboxes().info(clock).unwrap().kind, MailboxKind::Rendezvous);
    let disk = kernel.mailboxes().info(bridge.mailbox_of("disk1").unwrap()).unwrap();
    assert_eq!(disk.kind, MailboxKind::SingleSlot);
    assert_eq!(disk.max_message_size, 4);

    assert_eq!(bridge.kind_of("term3"), Some(DeviceKind::Terminal));
    assert!(bridge.handle_of("clock").is_none());
    assert!(bridge.handle_of("disk0").is_some());
}

#[test]
fn test_unresolved_devices_are_skipped() {
    let devices = SimulatedDevices::new(["disk0", "term1"]);
    let (_sched, kernel) = boot(&devices);
    let names: Vec<_> = kernel.devices().device_names().collect();
    assert_eq!(names, ["clock", "disk0", "term1"]);
    assert!(kernel.devices().mailbox_of("disk1").is_none());
    assert_eq!(kernel.devices().wait_device("disk1"), Err(IpcError::InvalidArgument));
}

#[test]
fn test_io_mailbox_capacity_follows_config() {
    mailbox_kernel::logger::init();
    let devices = SimulatedDevices::standard();
    let sched = Arc::new(ThreadScheduler::new());
    let config = MailboxConfig::default().with_io_mailbox_slots(3);
    let kernel = Messaging::start(config, sched, &devices).unwrap();
    let term = kernel.devices().mailbox_of("term0").unwrap();
    assert_eq!(kernel.mailboxes().info(term).unwrap().capacity, 3);
}

#[test]
fn test_clock_tick_reaches_waiter() {
    let devices = SimulatedDevices::standard();
    let (sched, kernel) = boot(&devices);
    assert!(!kernel.io_pending());

    let inner = Arc::clone(&kernel);
    let waiter = sched.spawn("clock-waiter", move || inner.devices().wait_device("clock"));
    assert_eq!(
        sched.wait_until_blocked(waiter.id()),
        Some(BlockReason::BlockedOnReceive)
    );
    assert!(kernel.io_pending());
    assert_eq!(kernel.devices().waiting(), 1);

    assert!(devices.clock_tick(42));
    assert_eq!(waiter.join().unwrap(), Ok(42));
    assert!(!kernel.io_pending());
}

#[test]
fn test_tick_without_waiter_is_dropped() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    assert!(!kernel.devices().deliver("clock", 1));

    let clock = kernel.devices().mailbox_of("clock").unwrap();
    let info = kernel.mailboxes().info(clock).unwrap();
    assert_eq!(info.pending, 0);
    assert_eq!(info.blocked_senders, 0);
}

#[test]
fn test_completion_before_wait_is_kept() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    assert!(devices.io_complete("disk0", 0xbeef));
    assert_eq!(kernel.devices().wait_device("disk0"), Ok(0xbeef));
}

#[test]
fn test_completion_on_full_mailbox_is_dropped() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    let bridge = kernel.devices();

    assert!(bridge.deliver("term2", 1));
    assert!(!bridge.deliver("term2", 2));
    assert_eq!(bridge.wait_device("term2"), Ok(1));

    let term = bridge.mailbox_of("term2").unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(kernel.mailboxes().try_receive(term, &mut buf), Err(IpcError::WouldBlock));
}

#[test]
fn test_interrupt_port_delivers() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    let port = kernel.devices().interrupt_port("disk1").unwrap();
    assert_eq!(port.device(), "disk1");
    assert!(port.deliver(9));
    assert_eq!(kernel.devices().wait_device("disk1"), Ok(9));
    assert!(kernel.devices().interrupt_port("tape0").is_none());
}

#[test]
fn test_unknown_device_interrupt_is_ignored() {
    let devices = SimulatedDevices::standard();
    let (_sched, _kernel) = boot(&devices);
    assert!(devices.io_complete("tape0", 5));
}

#[test]
fn test_signal_interrupts_device_wait() {
    let devices = SimulatedDevices::standard();
    let (sched, kernel) = boot(&devices);

    let inner = Arc::clone(&kernel);
    let waiter = sched.spawn("term-waiter", move || inner.devices().wait_device("term0"));
    sched.wait_until_blocked(waiter.id()).unwrap();

    sched.signal(waiter.id());
    assert_eq!(waiter.join().unwrap(), Err(IpcError::Interrupted));
    assert!(!kernel.io_pending());
}

#[test]
fn test_released_device_mailbox_interrupts_wait() {
    let devices = SimulatedDevices::standard();
    let (sched, kernel) = boot(&devices);

    let inner = Arc::clone(&kernel);
    let waiter = sched.spawn("disk-waiter", move || inner.devices().wait_device("disk0"));
    sched.wait_until_blocked(waiter.id()).unwrap();

    let disk = kernel.devices().mailbox_of("disk0").unwrap();
    kernel.mailboxes().free(disk).unwrap();
    assert_eq!(waiter.join().unwrap(), Err(IpcError::Interrupted));
}

#[test]
fn test_collected_status_survives_pending_signal() {
    let devices = SimulatedDevices::standard();
    let (sched, kernel) = boot(&devices);
    let disk = kernel.devices().mailbox_of("disk0").unwrap();

    assert!(devices.io_complete("disk0", 0xab));
    assert_eq!(kernel.mailboxes().info(disk).unwrap().pending, 1);

    let me = sched.current();
    sched.signal(me);
    assert_eq!(kernel.devices().wait_device("disk0"), Ok(0xab));
    assert_eq!(kernel.mailboxes().info(disk).unwrap().pending, 0);
    sched.clear_signal(me);
}

#[test]
fn test_reused_device_mailbox_is_not_followed() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    let bridge = kernel.devices();
    let disk = bridge.mailbox_of("disk0").unwrap();
    let before = kernel.mailboxes().info(disk).unwrap().generation;

    kernel.mailboxes().free(disk).unwrap();
    let user = kernel.mailboxes().create(4, 8).unwrap();
    assert_eq!(user, disk);
    assert_ne!(kernel.mailboxes().info(user).unwrap().generation, before);

    assert!(devices.io_complete("disk0", 0xdead));
    assert!(!bridge.deliver("disk0", 0xdead));
    let mut buf = [0u8; 8];
    assert_eq!(kernel.mailboxes().try_receive(user, &mut buf), Err(IpcError::WouldBlock));

    kernel.mailboxes().try_send(user, b"mine").unwrap();
    assert_eq!(bridge.wait_device("disk0"), Err(IpcError::InvalidArgument));
    assert_eq!(kernel.mailboxes().info(user).unwrap().pending, 1);
}

#[test]
fn test_user_mode_wait_halts() {
    let devices = SimulatedDevices::standard();
    let (sched, kernel) = boot(&devices);

    let inner = Arc::clone(&kernel);
    let user = sched.spawn_user("user", move || inner.devices().wait_device("clock"));
    let payload = user.join().unwrap_err();
    assert!(panic_message(payload).contains("wait_device requires kernel mode"));
    assert!(!kernel.io_pending());
}

#[test]
fn test_handlers_outlive_kernel_safely() {
    let devices = SimulatedDevices::standard();
    let (_sched, kernel) = boot(&devices);
    assert!(devices.has_handler(mailbox_kernel::InterruptKind::Timer));
    assert!(devices.has_handler(mailbox_kernel::InterruptKind::Io));
    drop(kernel);

    // The bridge is gone; the handlers turn into no-ops.
    assert!(devices.clock_tick(1));
    assert!(devices.io_complete("disk0", 1));
}
