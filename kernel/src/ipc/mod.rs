//! Mailbox IPC.
//!
//! A mailbox is a bounded FIFO of opaque byte messages, addressed by its
//! index in a fixed-size table. Its capacity, fixed at creation, selects
//! the delivery discipline:
//!
//! - capacity 0, [`MailboxKind::Rendezvous`]: nothing is buffered. A send
//!   completes only when it meets a receiver, and the payload moves
//!   straight from one to the other.
//! - capacity 1 or more, [`MailboxKind::SingleSlot`] /
//!   [`MailboxKind::MultiSlot`]: up to `capacity` messages wait in slots
//!   drawn from a [`SlotArena`](slot::SlotArena) shared by every mailbox.
//!
//! Both `send` and `receive` come in a blocking and a non-blocking
//! (`try_*`) flavour. Blocked parties queue in strict FIFO order and are
//! always served by the context that makes progress possible: a receiver
//! that frees a slot moves the oldest blocked sender's message into it, a
//! sender that finds a blocked receiver hands its message over directly.
//! A woken party therefore never has to compete for what woke it.
//!
//! [`MailboxSubsystem::free`] tears a mailbox down and wakes every blocked
//! party with [`IpcError::MailboxReleased`](crate::IpcError::MailboxReleased).

mod mailbox;
pub mod slot;
mod subsystem;

pub use mailbox::{MailboxInfo, MailboxKind, MailboxStatus};
pub use subsystem::MailboxSubsystem;

/// Index of a mailbox in the mailbox table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MailboxId(usize);

impl MailboxId {
    pub fn as_usize(self) -> usize {
        self.0
    }

    pub fn from_usize(raw: usize) -> Self {
        MailboxId(raw)
    }
}

impl core::fmt::Display for MailboxId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
