//! Syscall vector and the mailbox syscall handlers.

use super::{numbers::*, SyscallFrame};
use crate::{
    error::{Fault, IpcError, IpcResult},
    ipc::MailboxId,
    messaging::Messaging,
    panic::halt,
    process::{Privilege, Scheduler},
};
use alloc::vec;

/// A syscall handler. It reads its arguments from the frame and stores
/// the raw result in `frame.ret`.
pub type SyscallHandler<S> = fn(&Messaging<S>, &mut SyscallFrame);

/// Fixed table mapping syscall numbers to handlers. Empty entries run
/// `nullsys`.
pub struct SyscallVector<S> {
    handlers: [Option<SyscallHandler<S>>; MAX_SYSCALLS],
}

impl<S: Scheduler + Privilege> SyscallVector<S> {
    /// A vector with the mailbox calls installed.
    pub fn new() -> Self {
        let mut vector = SyscallVector {
            handlers: [None; MAX_SYSCALLS],
        };
        vector.install(SYS_MBOX_CREATE, sys_mbox_create);
        vector.install(SYS_MBOX_FREE, sys_mbox_free);
        vector.install(SYS_MBOX_SEND, sys_mbox_send);
        vector.install(SYS_MBOX_RECEIVE, sys_mbox_receive);
        vector.install(SYS_MBOX_COND_SEND, sys_mbox_cond_send);
        vector.install(SYS_MBOX_COND_RECEIVE, sys_mbox_cond_receive);
        vector.install(SYS_WAIT_DEVICE, sys_wait_device);
        vector
    }

    /// Replace the handler of `number`. Out-of-range numbers are ignored.
    pub fn install(&mut self, number: u64, handler: SyscallHandler<S>) {
        match usize::try_from(number)
            .ok()
            .and_then(|index| self.handlers.get_mut(index))
        {
            Some(entry) => *entry = Some(handler),
            None => log::warn!("syscall: cannot install handler for {}", number),
        }
    }

    pub fn is_assigned(&self, number: u64) -> bool {
        self.lookup(number).is_some()
    }

    fn lookup(&self, number: u64) -> Option<SyscallHandler<S>> {
        usize::try_from(number)
            .ok()
            .and_then(|index| self.handlers.get(index))
            .copied()
            .flatten()
    }

    /// Run the handler for `frame.number`.
    ///
    /// Must be entered in kernel mode. Numbers outside the vector halt
    /// like unassigned ones.
    pub fn dispatch(&self, messaging: &Messaging<S>, frame: &mut SyscallFrame) {
        if !messaging.mailboxes().scheduler().is_privileged() {
            halt(Fault::ProtocolViolation {
                operation: "syscall dispatch",
            });
        }
        let handler = self.lookup(frame.number).unwrap_or(nullsys::<S>);
        handler(messaging, frame);
    }
}

impl<S: Scheduler + Privilege> Default for SyscallVector<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn nullsys<S>(_messaging: &Messaging<S>, frame: &mut SyscallFrame) {
    log::warn!("syscall: no handler for {}", frame.number);
    halt(Fault::InvalidSyscall {
        number: frame.number,
    });
}

fn store<T: Into<i64>>(frame: &mut SyscallFrame, result: IpcResult<T>) {
    frame.ret = match result {
        Ok(value) => value.into(),
        Err(e) => e.to_raw(),
    };
}

/// A non-negative argument as `usize`.
fn count_arg(raw: i64) -> IpcResult<usize> {
    usize::try_from(raw).map_err(|_| IpcError::InvalidArgument)
}

fn mailbox_arg(raw: i64) -> IpcResult<MailboxId> {
    count_arg(raw).map(MailboxId::from_usize)
}

fn to_i64(value: usize) -> IpcResult<i64> {
    i64::try_from(value).map_err(|_| IpcError::InvalidArgument)
}

/// SYS_MBOX_CREATE: arg0 = capacity, arg1 = max message size.
fn sys_mbox_create<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame) {
    let result = (|| -> IpcResult<i64> {
        let capacity = count_arg(frame.args[0])?;
        let max_size = count_arg(frame.args[1])?;
        let id = messaging.mailboxes().create(capacity, max_size)?;
        log::debug!("syscall: MBOX_CREATE(cap={}, size={}) -> {}", capacity, max_size, id);
        to_i64(id.as_usize())
    })();
    store(frame, result);
}

/// SYS_MBOX_FREE: arg0 = mailbox id.
fn sys_mbox_free<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame) {
    let result = mailbox_arg(frame.args[0])
        .and_then(|id| messaging.mailboxes().free(id))
        .map(|()| 0i64);
    store(frame, result);
}

fn mbox_send<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame, wait: bool) {
    let result = (|| -> IpcResult<i64> {
        let id = mailbox_arg(frame.args[0])?;
        let len = count_arg(frame.args[1])?;
        let payload = frame.buffer.get(..len).ok_or(IpcError::InvalidArgument)?;
        messaging.mailboxes().send_inner(id, payload, wait)?;
        Ok(0i64)
    })();
    store(frame, result);
}

fn mbox_receive<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame, wait: bool) {
    let result = (|| -> IpcResult<i64> {
        let id = mailbox_arg(frame.args[0])?;
        // No message is longer than the system maximum.
        let capacity = count_arg(frame.args[1])?.min(messaging.mailboxes().config().max_message);
        let mut buffer = vec![0u8; capacity];
        let len = messaging.mailboxes().receive_inner(id, &mut buffer, wait)?;
        buffer.truncate(len);
        frame.buffer = buffer;
        to_i64(len)
    })();
    store(frame, result);
}

/// SYS_MBOX_SEND: arg0 = mailbox id, arg1 = length of `buffer` to send.
fn sys_mbox_send<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame) {
    mbox_send(messaging, frame, true);
}

/// SYS_MBOX_COND_SEND: like SYS_MBOX_SEND, never blocks.
fn sys_mbox_cond_send<S: Scheduler + Privilege>(
    messaging: &Messaging<S>,
    frame: &mut SyscallFrame,
) {
    mbox_send(messaging, frame, false);
}

/// SYS_MBOX_RECEIVE: arg0 = mailbox id, arg1 = receive buffer size.
/// The message is left in `buffer`.
fn sys_mbox_receive<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame) {
    mbox_receive(messaging, frame, true);
}

/// SYS_MBOX_COND_RECEIVE: like SYS_MBOX_RECEIVE, never blocks.
fn sys_mbox_cond_receive<S: Scheduler + Privilege>(
    messaging: &Messaging<S>,
    frame: &mut SyscallFrame,
) {
    mbox_receive(messaging, frame, false);
}

/// SYS_WAIT_DEVICE: device name in `buffer`; the status is returned.
fn sys_wait_device<S: Scheduler + Privilege>(messaging: &Messaging<S>, frame: &mut SyscallFrame) {
    let result = core::str::from_utf8(&frame.buffer)
        .map_err(|_| IpcError::InvalidArgument)
        .and_then(|name| messaging.devices().wait_device(name));
    store(frame, result);
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::{config::MailboxConfig, devices::SimulatedDevices, process::ThreadScheduler};
    use alloc::sync::Arc;

    fn boot() -> Messaging<Arc<ThreadScheduler>> {
        let devices = SimulatedDevices::standard();
        Messaging::start(
            MailboxConfig::default(),
            Arc::new(ThreadScheduler::new()),
            &devices,
        )
        .unwrap()
    }

    fn double<S>(_messaging: &Messaging<S>, frame: &mut SyscallFrame) {
        frame.ret = frame.args[0] * 2;
    }

    #[test]
    fn test_install_replaces_nullsys() {
        let mut messaging = boot();
        assert!(!messaging.syscalls().is_assigned(1));
        messaging.syscalls_mut().install(1, double);
        assert!(messaging.syscalls().is_assigned(1));

        let mut frame = SyscallFrame::new(1).with_args(&[21]);
        messaging.dispatch(&mut frame);
        assert_eq!(frame.ret, 42);
    }

    #[test]
    fn test_install_out_of_range_is_ignored() {
        let mut messaging = boot();
        messaging
            .syscalls_mut()
            .install(MAX_SYSCALLS as u64, double);
        assert!(!messaging.syscalls().is_assigned(MAX_SYSCALLS as u64));
    }

    #[test]
    fn test_argument_decoding() {
        assert_eq!(count_arg(7), Ok(7));
        assert_eq!(count_arg(-1), Err(IpcError::InvalidArgument));
        assert_eq!(mailbox_arg(3).map(MailboxId::as_usize), Ok(3));
        assert_eq!(mailbox_arg(i64::MIN), Err(IpcError::InvalidArgument));
    }

    #[test]
    fn test_store_encodes_errors() {
        let mut frame = SyscallFrame::new(SYS_MBOX_SEND);
        store(&mut frame, Ok::<i64, _>(5));
        assert_eq!(frame.ret, 5);
        store::<i64>(&mut frame, Err(IpcError::WouldBlock));
        assert_eq!(frame.ret, -2);
    }
}
