//! Shared arena of fixed-size message slots.
//!
//! All slotted mailboxes draw their buffered messages from one arena sized
//! at initialisation. Slots are addressed by index and recycled through a
//! free stack, so acquire and release are O(1) and a slot can never be
//! reached through a dangling link. Each occupied slot records the mailbox
//! that owns it; releasing a slot on behalf of any other mailbox is an
//! integrity fault.

use super::MailboxId;
use crate::{error::Fault, panic::halt};
use alloc::{boxed::Box, vec, vec::Vec};

/// Index of a slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// One storage cell: a payload buffer of the system's maximum message size.
struct Slot {
    owner: Option<MailboxId>,
    payload: Box<[u8]>,
    len: usize,
}

pub struct SlotArena {
    slots: Vec<Slot>,
    free: Vec<SlotIndex>,
}

impl SlotArena {
    /// Allocate `count` slots of `slot_size` bytes each.
    pub fn new(count: usize, slot_size: usize) -> Self {
        let slots = (0..count)
            .map(|_| Slot {
                owner: None,
                payload: vec![0u8; slot_size].into_boxed_slice(),
                len: 0,
            })
            .collect();
        // Reversed so that slot 0 is handed out first.
        let free = (0..count).rev().map(SlotIndex).collect();
        SlotArena { slots, free }
    }

    /// Copy `bytes` into a free slot owned by `owner`.
    ///
    /// Returns `None` when every slot is in use. `bytes` must fit the slot
    /// size; callers validate message length before reaching the arena.
    pub fn acquire(&mut self, owner: MailboxId, bytes: &[u8]) -> Option<SlotIndex> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index.0];
        debug_assert!(slot.owner.is_none());
        debug_assert!(bytes.len() <= slot.payload.len());
        slot.payload[..bytes.len()].copy_from_slice(bytes);
        slot.len = bytes.len();
        slot.owner = Some(owner);
        Some(index)
    }

    /// The message stored in `index`.
    pub fn message(&self, index: SlotIndex) -> &[u8] {
        let slot = &self.slots[index.0];
        &slot.payload[..slot.len]
    }

    /// Return `index` to the free pool. Halts if `owner` does not own it.
    pub fn release(&mut self, owner: MailboxId, index: SlotIndex) {
        let slot = &mut self.slots[index.0];
        if slot.owner != Some(owner) {
            halt(Fault::SlotOwnership {
                slot: index.0,
                mailbox: owner.as_usize(),
            });
        }
        slot.owner = None;
        slot.len = 0;
        self.free.push(index);
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots available for new messages.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity() - self.free_count()
    }
}
