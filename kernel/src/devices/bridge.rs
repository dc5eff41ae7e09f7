use super::{
    DeviceHandle, DeviceKind, DeviceRegistry, InterruptEvent, InterruptKind, CLOCK_DEVICE,
    IO_DEVICES,
};
use crate::{
    config::DEVICE_STATUS_SIZE,
    error::{Fault, IpcError, IpcResult},
    ipc::{MailboxId, MailboxSubsystem},
    panic::halt,
    process::{Privilege, Scheduler},
};
use alloc::{sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};

struct DeviceEntry {
    name: &'static str,
    kind: DeviceKind,
    handle: Option<DeviceHandle>,
    mailbox: MailboxId,
    /// Generation of the mailbox entry created for this device. Once the
    /// entry is freed and reused, the device no longer reaches it.
    generation: u64,
}

/// Maps device completions onto per-device mailboxes.
pub struct DeviceBridge<S> {
    mailboxes: Arc<MailboxSubsystem<S>>,
    devices: Vec<DeviceEntry>,
    /// Contexts currently inside `wait_device`.
    waiting: AtomicUsize,
}

/// Non-blocking delivery endpoint for one device.
///
/// This is the only way interrupt code reaches a device mailbox; it can
/// send, but never wait.
pub struct InterruptPort<'a, S> {
    mailboxes: &'a MailboxSubsystem<S>,
    device: &'static str,
    kind: DeviceKind,
    mailbox: MailboxId,
    generation: u64,
}

/// Keeps the waiting counter balanced even if the wait unwinds.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        WaitingGuard(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<S: Scheduler> InterruptPort<'_, S> {
    /// Post `status` without blocking.
    ///
    /// Returns `false` if the status was dropped: the clock had no waiter,
    /// an I/O mailbox still holds earlier completions nobody collected, or
    /// the device mailbox has been freed.
    pub fn deliver(&self, status: u32) -> bool {
        let bytes = status.to_le_bytes();
        match self
            .mailboxes
            .send_at(self.mailbox, Some(self.generation), &bytes, false)
        {
            Ok(()) => true,
            Err(IpcError::WouldBlock) if self.kind == DeviceKind::Clock => {
                log::trace!("dev {}: tick with no waiter dropped", self.device);
                false
            }
            Err(IpcError::WouldBlock) => {
                log::warn!(
                    "dev {}: mailbox {} full, completion status {:#x} dropped",
                    self.device,
                    self.mailbox,
                    status
                );
                false
            }
            Err(IpcError::InvalidArgument) => {
                log::warn!(
                    "dev {}: mailbox {} released, status {:#x} dropped",
                    self.device,
                    self.mailbox,
                    status
                );
                false
            }
            Err(e) => {
                log::warn!("dev {}: delivery failed: {}", self.device, e);
                false
            }
        }
    }

    pub fn device(&self) -> &'static str {
        self.device
    }
}

impl<S: Scheduler + Privilege + 'static> DeviceBridge<S> {
    /// Create the device mailboxes and hook the timer and I/O interrupts.
    ///
    /// I/O devices the registry cannot resolve are skipped; the clock is
    /// always present.
    pub fn start(
        mailboxes: Arc<MailboxSubsystem<S>>,
        registry: &dyn DeviceRegistry,
    ) -> IpcResult<Arc<Self>> {
        let io_slots = mailboxes.config().io_mailbox_slots;
        let mut devices = Vec::with_capacity(IO_DEVICES.len() + 1);

        let (mailbox, generation) = mailboxes.create_tagged(0, DEVICE_STATUS_SIZE)?;
        devices.push(DeviceEntry {
            name: CLOCK_DEVICE,
            kind: DeviceKind::Clock,
            handle: None,
            mailbox,
            generation,
        });
        for (name, kind) in IO_DEVICES {
            let Some(handle) = registry.resolve(name) else {
                log::warn!("dev {}: not present, skipped", name);
                continue;
            };
            let (mailbox, generation) = mailboxes.create_tagged(io_slots, DEVICE_STATUS_SIZE)?;
            devices.push(DeviceEntry {
                name,
                kind,
                handle: Some(handle),
                mailbox,
                generation,
            });
        }

        let bridge = Arc::new(DeviceBridge {
            mailboxes,
            devices,
            waiting: AtomicUsize::new(0),
        });
        bridge.install_handlers(registry);
        log::info!("dev: bridge ready ({} devices)", bridge.devices.len());
        Ok(bridge)
    }

    fn install_handlers(self: &Arc<Self>, registry: &dyn DeviceRegistry) {
        let bridge = Arc::downgrade(self);
        registry.register_interrupt_handler(
            InterruptKind::Timer,
            Arc::new(move |event: &InterruptEvent<'_>| {
                if let Some(bridge) = bridge.upgrade() {
                    bridge.deliver(CLOCK_DEVICE, event.status);
                }
            }),
        );

        let bridge = Arc::downgrade(self);
        registry.register_interrupt_handler(
            InterruptKind::Io,
            Arc::new(move |event: &InterruptEvent<'_>| {
                if let Some(bridge) = bridge.upgrade() {
                    bridge.deliver(event.device, event.status);
                }
            }),
        );
    }
}

impl<S: Scheduler + Privilege> DeviceBridge<S> {
    fn find(&self, name: &str) -> Option<&DeviceEntry> {
        self.devices.iter().find(|dev| dev.name == name)
    }

    /// Block until the next completion of `name` and return its status.
    ///
    /// Kernel mode only: an unprivileged caller halts the system. Returns
    /// [`IpcError::Interrupted`] if the wait was cut short by a signal or
    /// by the device mailbox being released. A status that was already
    /// taken off the mailbox is always returned. Once the device mailbox
    /// has been freed, later waits fail with [`IpcError::InvalidArgument`].
    pub fn wait_device(&self, name: &str) -> IpcResult<u32> {
        let scheduler = self.mailboxes.scheduler();
        if !scheduler.is_privileged() {
            halt(Fault::ProtocolViolation {
                operation: "wait_device",
            });
        }
        let dev = self.find(name).ok_or(IpcError::InvalidArgument)?;

        let mut status = [0u8; DEVICE_STATUS_SIZE];
        let result = {
            let _waiting = WaitingGuard::enter(&self.waiting);
            self.mailboxes
                .receive_at(dev.mailbox, Some(dev.generation), &mut status, true)
        };
        match result {
            Ok(_) => Ok(u32::from_le_bytes(status)),
            Err(IpcError::MailboxReleased) | Err(IpcError::Interrupted) => {
                Err(IpcError::Interrupted)
            }
            Err(e) => Err(e),
        }
    }

    /// The non-blocking delivery endpoint of `name`.
    pub fn interrupt_port(&self, name: &str) -> Option<InterruptPort<'_, S>> {
        self.find(name).map(|dev| InterruptPort {
            mailboxes: &self.mailboxes,
            device: dev.name,
            kind: dev.kind,
            mailbox: dev.mailbox,
            generation: dev.generation,
        })
    }

    /// Post a completion for `name` from interrupt context.
    pub fn deliver(&self, name: &str, status: u32) -> bool {
        match self.interrupt_port(name) {
            Some(port) => port.deliver(status),
            None => {
                log::warn!("dev: interrupt for unknown device {:?}", name);
                false
            }
        }
    }

    /// Whether any context is blocked waiting for a device. The scheduler
    /// uses this to tell "idle, waiting for I/O" from deadlock.
    pub fn io_pending(&self) -> bool {
        self.waiting.load(Ordering::Acquire) > 0
    }

    /// Number of contexts inside [`wait_device`](Self::wait_device).
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// The mailbox created for `name` at start. It may have been freed
    /// since; the bridge never follows a reused entry.
    pub fn mailbox_of(&self, name: &str) -> Option<MailboxId> {
        self.find(name).map(|dev| dev.mailbox)
    }

    pub fn handle_of(&self, name: &str) -> Option<DeviceHandle> {
        self.find(name).and_then(|dev| dev.handle)
    }

    pub fn kind_of(&self, name: &str) -> Option<DeviceKind> {
        self.find(name).map(|dev| dev.kind)
    }

    /// Names of the devices set up at start, clock first.
    pub fn device_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.devices.iter().map(|dev| dev.name)
    }

    pub fn mailboxes(&self) -> &Arc<MailboxSubsystem<S>> {
        &self.mailboxes
    }
}
