//! FIFO queues of blocked execution contexts.
//!
//! ## Overview
//!
//! Every mailbox owns two [`WaitQueue`]s: one for contexts blocked in
//! `send`, one for contexts blocked in `receive`. A queue only records
//! *who* is waiting and the data needed to serve them (the sender's
//! payload, the receiver's buffer size). It does not block or wake anyone
//! by itself: the mailbox operations push the caller, release the table
//! lock and suspend through the scheduler, and the party that later
//! serves a waiter pops it and resumes it.
//!
//! The queue has no lock of its own. It lives inside the mailbox table
//! and is only touched under the subsystem's critical section, which is
//! what makes "check, then enqueue" atomic with respect to wakers.
//!
//! ## Ordering
//!
//! Strict FIFO. Waiters are served in arrival order and never reordered;
//! a waiter leaves the queue early only when it is interrupted
//! ([`WaitQueue::remove`]) or the mailbox is torn down
//! ([`WaitQueue::drain`]).

use crate::process::ContextId;
use alloc::collections::VecDeque;

/// An entry in a [`WaitQueue`].
pub trait Waiter {
    /// The blocked context this entry belongs to.
    fn context(&self) -> ContextId;
}

impl Waiter for ContextId {
    fn context(&self) -> ContextId {
        *self
    }
}

/// A FIFO queue of blocked contexts.
#[derive(Debug)]
pub struct WaitQueue<W> {
    waiters: VecDeque<W>,
}

impl<W: Waiter> WaitQueue<W> {
    /// Create a new empty wait queue.
    pub const fn new() -> Self {
        WaitQueue {
            waiters: VecDeque::new(),
        }
    }

    /// Append a waiter at the tail.
    pub fn push_back(&mut self, waiter: W) {
        self.waiters.push_back(waiter);
    }

    /// Take the longest-waiting entry.
    pub fn pop_front(&mut self) -> Option<W> {
        self.waiters.pop_front()
    }

    /// Peek at the longest-waiting entry.
    pub fn front(&self) -> Option<&W> {
        self.waiters.front()
    }

    /// Remove the entry of `ctx`, wherever it sits. The relative order of
    /// the remaining waiters is preserved.
    pub fn remove(&mut self, ctx: ContextId) -> Option<W> {
        let index = self.waiters.iter().position(|w| w.context() == ctx)?;
        self.waiters.remove(index)
    }

    pub fn contains(&self, ctx: ContextId) -> bool {
        self.waiters.iter().any(|w| w.context() == ctx)
    }

    /// Empty the queue, yielding waiters oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = W> + '_ {
        self.waiters.drain(..)
    }

    /// Returns the number of contexts currently registered in this queue.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

impl<W: Waiter> Default for WaitQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn ids(n: u64) -> Vec<ContextId> {
        (1..=n).map(ContextId::from_u64).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = WaitQueue::new();
        for id in ids(3) {
            queue.push_back(id);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_front(), Some(ContextId::from_u64(1)));
        assert_eq!(queue.pop_front(), Some(ContextId::from_u64(2)));
        assert_eq!(queue.pop_front(), Some(ContextId::from_u64(3)));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = WaitQueue::new();
        for id in ids(4) {
            queue.push_back(id);
        }
        assert_eq!(queue.remove(ContextId::from_u64(2)), Some(ContextId::from_u64(2)));
        assert_eq!(queue.remove(ContextId::from_u64(9)), None);
        assert!(!queue.contains(ContextId::from_u64(2)));

        let rest: Vec<u64> = queue.drain().map(ContextId::as_u64).collect();
        assert_eq!(rest, [1, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_front_does_not_dequeue() {
        let mut queue = WaitQueue::new();
        queue.push_back(ContextId::from_u64(5));
        assert_eq!(queue.front(), Some(&ContextId::from_u64(5)));
        assert_eq!(queue.len(), 1);
    }
}
