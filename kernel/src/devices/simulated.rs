//! Hosted device subsystem: a fixed set of named devices whose interrupts
//! are raised on demand.

use super::{
    DeviceHandle, DeviceRegistry, InterruptEvent, InterruptHandler, InterruptKind, IO_DEVICES,
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

pub struct SimulatedDevices {
    names: Vec<String>,
    handlers: Mutex<BTreeMap<InterruptKind, InterruptHandler>>,
}

impl SimulatedDevices {
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        SimulatedDevices {
            names: names.into_iter().map(Into::into).collect(),
            handlers: Mutex::new(BTreeMap::new()),
        }
    }

    /// All disks and terminals of the standard machine.
    pub fn standard() -> Self {
        Self::new(IO_DEVICES.iter().map(|(name, _)| *name))
    }

    /// Run the handler registered for `kind`, as the interrupt controller
    /// would. Returns `false` if no handler is installed.
    pub fn raise(&self, kind: InterruptKind, device: &str, status: u32) -> bool {
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned();
        match handler {
            Some(handler) => {
                handler(&InterruptEvent {
                    device,
                    command: 0,
                    status,
                });
                true
            }
            None => false,
        }
    }

    pub fn clock_tick(&self, status: u32) -> bool {
        self.raise(InterruptKind::Timer, super::CLOCK_DEVICE, status)
    }

    pub fn io_complete(&self, device: &str, status: u32) -> bool {
        self.raise(InterruptKind::Io, device, status)
    }

    pub fn has_handler(&self, kind: InterruptKind) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }
}

impl DeviceRegistry for SimulatedDevices {
    fn resolve(&self, name: &str) -> Option<DeviceHandle> {
        self.names
            .iter()
            .position(|known| known == name)
            .map(|index| DeviceHandle(index as u32))
    }

    fn register_interrupt_handler(&self, kind: InterruptKind, handler: InterruptHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, handler);
    }
}
