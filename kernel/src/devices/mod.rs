//! Device collaborators and the device bridge.
//!
//! Every device the kernel knows about gets one mailbox at start-up. A
//! context that wants the next completion of a device calls
//! [`DeviceBridge::wait_device`] and blocks on that mailbox; the device's
//! interrupt handler posts the completion status with a non-blocking send
//! through an [`InterruptPort`].
//!
//! - `clock` uses a rendezvous mailbox: a tick is only delivered to a
//!   context that is already waiting for it.
//! - disks and terminals use slotted mailboxes, so a completion that fires
//!   before its consumer waits is kept (up to the mailbox capacity).

mod bridge;
#[cfg(feature = "std")]
mod simulated;

pub use bridge::{DeviceBridge, InterruptPort};
#[cfg(feature = "std")]
pub use simulated::SimulatedDevices;

use alloc::sync::Arc;

/// Name of the clock device.
pub const CLOCK_DEVICE: &str = "clock";

/// The I/O devices the bridge sets up, in mailbox allocation order.
pub const IO_DEVICES: [(&str, DeviceKind); 6] = [
    ("disk0", DeviceKind::Disk),
    ("disk1", DeviceKind::Disk),
    ("term0", DeviceKind::Terminal),
    ("term1", DeviceKind::Terminal),
    ("term2", DeviceKind::Terminal),
    ("term3", DeviceKind::Terminal),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Clock,
    Disk,
    Terminal,
}

/// Opaque handle returned by the device subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceHandle(pub u32);

/// Interrupt vectors the bridge hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterruptKind {
    Timer,
    Io,
}

/// What an interrupt handler is told about the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptEvent<'a> {
    pub device: &'a str,
    pub command: u8,
    pub status: u32,
}

/// Callback run in interrupt context. Must never block.
pub type InterruptHandler = Arc<dyn Fn(&InterruptEvent<'_>) + Send + Sync>;

/// The device subsystem as seen by the bridge.
pub trait DeviceRegistry: Send + Sync {
    /// Look a device up by name.
    fn resolve(&self, name: &str) -> Option<DeviceHandle>;

    /// Install `handler` for interrupts of `kind`, replacing any previous one.
    fn register_interrupt_handler(&self, kind: InterruptKind, handler: InterruptHandler);
}
