//! The messaging subsystem as the rest of the kernel sees it.

use crate::{
    config::MailboxConfig,
    devices::{DeviceBridge, DeviceRegistry},
    error::IpcResult,
    ipc::MailboxSubsystem,
    process::{Privilege, Scheduler},
    syscall::{SyscallFrame, SyscallVector},
};
use alloc::sync::Arc;

/// Mailbox table, device bridge and syscall vector of one kernel.
pub struct Messaging<S> {
    mailboxes: Arc<MailboxSubsystem<S>>,
    devices: Arc<DeviceBridge<S>>,
    syscalls: SyscallVector<S>,
}

impl<S: Scheduler + Privilege + 'static> Messaging<S> {
    /// Bring the subsystem up: build the mailbox table, create the device
    /// mailboxes, hook the interrupts and fill the syscall vector.
    pub fn start(
        config: MailboxConfig,
        scheduler: S,
        devices: &dyn DeviceRegistry,
    ) -> IpcResult<Self> {
        let mailboxes = Arc::new(MailboxSubsystem::new(config, scheduler));
        let devices = DeviceBridge::start(mailboxes.clone(), devices)?;
        log::info!(
            "messaging: started ({} mailboxes, {} slots, {} byte messages)",
            config.max_mailboxes,
            config.max_slots,
            config.max_message
        );
        Ok(Messaging {
            mailboxes,
            devices,
            syscalls: SyscallVector::new(),
        })
    }
}

impl<S: Scheduler + Privilege> Messaging<S> {
    pub fn mailboxes(&self) -> &MailboxSubsystem<S> {
        &self.mailboxes
    }

    pub fn devices(&self) -> &DeviceBridge<S> {
        &self.devices
    }

    pub fn syscalls(&self) -> &SyscallVector<S> {
        &self.syscalls
    }

    pub fn syscalls_mut(&mut self) -> &mut SyscallVector<S> {
        &mut self.syscalls
    }

    /// Handle one system call trap.
    pub fn dispatch(&self, frame: &mut SyscallFrame) {
        self.syscalls.dispatch(self, frame);
    }

    /// Whether some context is blocked waiting for a device.
    pub fn io_pending(&self) -> bool {
        self.devices.io_pending()
    }
}
