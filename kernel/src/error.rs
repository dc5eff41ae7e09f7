//! Error types for the messaging subsystem.
//!
//! Recoverable conditions are [`IpcError`] values returned to the caller.
//! Their integer codes are part of the syscall ABI. Unrecoverable
//! conditions are [`Fault`]s and never returned: they go through
//! [`crate::panic::halt`].

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub type IpcResult<T> = Result<T, IpcError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, thiserror::Error)]
#[must_use]
#[repr(i64)]
pub enum IpcError {
    #[error("invalid argument")]
    InvalidArgument = -1,
    #[error("operation would block")]
    WouldBlock = -2,
    #[error("mailbox released while waiting")]
    MailboxReleased = -3,
    #[error("interrupted by signal")]
    Interrupted = -5,
}

impl IpcError {
    #[inline]
    pub fn to_raw(self) -> i64 {
        self.into()
    }

    /// Unknown codes map to `InvalidArgument`.
    pub fn from_code(code: i64) -> Self {
        Self::try_from(code).unwrap_or(IpcError::InvalidArgument)
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            IpcError::InvalidArgument => "EINVAL",
            IpcError::WouldBlock => "EWOULDBLOCK",
            IpcError::MailboxReleased => "ERELEASED",
            IpcError::Interrupted => "EINTR",
        }
    }
}

/// A system invariant violation. Raising one halts the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("slot arena exhausted ({slots} slots in use)")]
    ResourceExhausted { slots: usize },
    #[error("{operation} requires kernel mode")]
    ProtocolViolation { operation: &'static str },
    #[error("invalid syscall {number}")]
    InvalidSyscall { number: u64 },
    #[error("slot {slot} released by mailbox {mailbox} which does not own it")]
    SlotOwnership { slot: usize, mailbox: usize },
}
