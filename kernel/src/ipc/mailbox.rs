//! Mailbox table entries and the state of blocked parties.

use super::{slot::SlotIndex, MailboxId};
use crate::{
    process::ContextId,
    sync::{WaitQueue, Waiter},
};
use alloc::{collections::VecDeque, vec::Vec};

/// Lifecycle of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxStatus {
    Empty,
    InUse,
    /// Teardown in progress. Only observable inside `free`.
    Released,
}

/// Delivery discipline, derived from the capacity at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxKind {
    Rendezvous,
    SingleSlot,
    MultiSlot,
}

impl MailboxKind {
    pub fn from_capacity(capacity: usize) -> Self {
        match capacity {
            0 => MailboxKind::Rendezvous,
            1 => MailboxKind::SingleSlot,
            _ => MailboxKind::MultiSlot,
        }
    }
}

/// Snapshot of an in-use mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxInfo {
    pub id: MailboxId,
    pub kind: MailboxKind,
    pub capacity: usize,
    pub max_message_size: usize,
    /// Bumped every time the table entry is reused.
    pub generation: u64,
    pub pending: usize,
    pub blocked_senders: usize,
    pub blocked_receivers: usize,
}

/// A context blocked in `send`, holding the message it wants delivered.
pub(super) struct SendWaiter {
    pub ctx: ContextId,
    pub message: Vec<u8>,
}

impl Waiter for SendWaiter {
    fn context(&self) -> ContextId {
        self.ctx
    }
}

/// A context blocked in `receive`, with the size of its buffer.
pub(super) struct RecvWaiter {
    pub ctx: ContextId,
    pub buffer_len: usize,
}

impl Waiter for RecvWaiter {
    fn context(&self) -> ContextId {
        self.ctx
    }
}

/// What the context that served a blocked party did for it. Posted under
/// the table lock before the party is resumed.
pub(super) enum Wakeup {
    /// The sender's message was handed to a receiver or buffered.
    Sent,
    /// A message delivered straight to a blocked receiver.
    Message(Vec<u8>),
    /// The offered message does not fit the receiver's buffer.
    Rejected,
    /// The mailbox was freed.
    Released,
}

pub(super) struct Mailbox {
    pub status: MailboxStatus,
    pub kind: MailboxKind,
    pub capacity: usize,
    pub max_message_size: usize,
    /// Number of times this entry has been opened. Survives `reset`.
    pub generation: u64,
    /// Buffered messages, oldest first. Its length is the occupancy count.
    pub pending: VecDeque<SlotIndex>,
    pub blocked_senders: WaitQueue<SendWaiter>,
    pub blocked_receivers: WaitQueue<RecvWaiter>,
}

impl Mailbox {
    pub const fn empty() -> Self {
        Mailbox {
            status: MailboxStatus::Empty,
            kind: MailboxKind::Rendezvous,
            capacity: 0,
            max_message_size: 0,
            generation: 0,
            pending: VecDeque::new(),
            blocked_senders: WaitQueue::new(),
            blocked_receivers: WaitQueue::new(),
        }
    }

    pub fn open(&mut self, capacity: usize, max_message_size: usize) {
        debug_assert_eq!(self.status, MailboxStatus::Empty);
        *self = Mailbox {
            status: MailboxStatus::InUse,
            kind: MailboxKind::from_capacity(capacity),
            capacity,
            max_message_size,
            generation: self.generation.wrapping_add(1),
            ..Mailbox::empty()
        };
    }

    /// Return the entry to `Empty`. Queues must already be drained.
    pub fn reset(&mut self) {
        debug_assert!(self.pending.is_empty());
        debug_assert!(self.blocked_senders.is_empty());
        debug_assert!(self.blocked_receivers.is_empty());
        let generation = self.generation;
        *self = Mailbox::empty();
        self.generation = generation;
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    pub fn info(&self, id: MailboxId) -> MailboxInfo {
        MailboxInfo {
            id,
            kind: self.kind,
            capacity: self.capacity,
            max_message_size: self.max_message_size,
            generation: self.generation,
            pending: self.pending.len(),
            blocked_senders: self.blocked_senders.len(),
            blocked_receivers: self.blocked_receivers.len(),
        }
    }
}
