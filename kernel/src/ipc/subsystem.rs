//! Mailbox operations: create, send, receive, free.
//!
//! ## Critical section
//!
//! The mailbox table, every blocked-party queue and the slot arena sit
//! behind one lock. Each public operation takes it once, does all of its
//! table work, and drops it before resuming anyone. A blocking call
//! enqueues itself under the lock, drops the lock, and only then suspends;
//! after waking it takes the lock again to collect its result.
//!
//! ## Wakeups
//!
//! The context that unblocks a waiter finishes the waiter's operation for
//! it while still holding the lock, and posts a [`Wakeup`] describing the
//! result:
//!
//! ```text
//!   blocked receiver  ← sender hands the payload over        (Message)
//!   blocked sender    ← receiver moves it into the freed slot (Sent)
//!   blocked sender    ← rendezvous receiver takes the payload (Sent)
//!   anyone            ← free() tears the mailbox down         (Released)
//! ```
//!
//! A resumed context that finds no wakeup posted for it is either still
//! queued (a stale resume token: it goes back to sleep) or was signaled.

use super::{
    mailbox::{Mailbox, MailboxInfo, MailboxStatus, RecvWaiter, SendWaiter, Wakeup},
    slot::SlotArena,
    MailboxId, MailboxKind,
};
use crate::{
    config::MailboxConfig,
    error::{Fault, IpcError, IpcResult},
    panic::halt,
    process::{BlockReason, ContextId, Scheduler, WakeCause},
};
use alloc::{collections::BTreeMap, vec::Vec};
use spin::Mutex;

/// State guarded by the subsystem's critical section.
struct Tables {
    mailboxes: Vec<Mailbox>,
    arena: SlotArena,
    /// Results posted for blocked contexts, collected when they resume.
    wakeups: BTreeMap<ContextId, Wakeup>,
}

/// Outcome of a blocking wait.
enum Woken {
    Served(Wakeup),
    /// Resumed, not queued any more, and nothing posted.
    Unserved,
}

/// The mailbox table with its slot arena.
///
/// One value is one independent messaging namespace. `S` is the scheduler
/// used to identify, suspend and resume callers.
pub struct MailboxSubsystem<S> {
    config: MailboxConfig,
    tables: Mutex<Tables>,
    scheduler: S,
}

fn lookup(mailboxes: &mut [Mailbox], id: MailboxId) -> IpcResult<&mut Mailbox> {
    match mailboxes.get_mut(id.as_usize()) {
        Some(mbox) if mbox.status == MailboxStatus::InUse => Ok(mbox),
        _ => Err(IpcError::InvalidArgument),
    }
}

/// Like [`lookup`], but also fails if the entry has been reopened since
/// `generation` was observed.
fn lookup_current(
    mailboxes: &mut [Mailbox],
    id: MailboxId,
    generation: Option<u64>,
) -> IpcResult<&mut Mailbox> {
    let mbox = lookup(mailboxes, id)?;
    match generation {
        Some(generation) if generation != mbox.generation => Err(IpcError::InvalidArgument),
        _ => Ok(mbox),
    }
}

impl Tables {
    /// Send without blocking. `None` means the caller would have to wait.
    fn try_send(
        &mut self,
        id: MailboxId,
        generation: Option<u64>,
        payload: &[u8],
        wake: &mut Vec<ContextId>,
    ) -> Option<IpcResult<()>> {
        let Tables {
            mailboxes,
            arena,
            wakeups,
        } = self;
        let mbox = match lookup_current(mailboxes, id, generation) {
            Ok(mbox) => mbox,
            Err(e) => return Some(Err(e)),
        };
        if payload.len() > mbox.max_message_size {
            return Some(Err(IpcError::InvalidArgument));
        }

        // A waiting receiver takes the message directly. Receivers whose
        // buffer is too small are failed and skipped.
        while let Some(receiver) = mbox.blocked_receivers.pop_front() {
            wake.push(receiver.ctx);
            if receiver.buffer_len < payload.len() {
                log::trace!(
                    "mbox {}: receiver {} buffer {} < message {}",
                    id,
                    receiver.ctx,
                    receiver.buffer_len,
                    payload.len()
                );
                wakeups.insert(receiver.ctx, Wakeup::Rejected);
                continue;
            }
            log::trace!("mbox {}: handoff to receiver {}", id, receiver.ctx);
            wakeups.insert(receiver.ctx, Wakeup::Message(payload.to_vec()));
            return Some(Ok(()));
        }

        if mbox.kind == MailboxKind::Rendezvous || mbox.is_full() {
            return None;
        }

        let slot = match arena.acquire(id, payload) {
            Some(slot) => slot,
            None => halt(Fault::ResourceExhausted {
                slots: arena.capacity(),
            }),
        };
        mbox.pending.push_back(slot);
        Some(Ok(()))
    }

    /// Receive without blocking. `None` means the caller would have to wait.
    fn try_receive(
        &mut self,
        id: MailboxId,
        generation: Option<u64>,
        buf: &mut [u8],
        wake: &mut Vec<ContextId>,
    ) -> Option<IpcResult<usize>> {
        let Tables {
            mailboxes,
            arena,
            wakeups,
        } = self;
        let mbox = match lookup_current(mailboxes, id, generation) {
            Ok(mbox) => mbox,
            Err(e) => return Some(Err(e)),
        };

        if let Some(&head) = mbox.pending.front() {
            let message = arena.message(head);
            let len = message.len();
            if len > buf.len() {
                return Some(Err(IpcError::InvalidArgument));
            }
            buf[..len].copy_from_slice(message);
            mbox.pending.pop_front();
            arena.release(id, head);

            // Refill the freed capacity from the oldest blocked sender.
            if let Some(sender) = mbox.blocked_senders.pop_front() {
                let slot = match arena.acquire(id, &sender.message) {
                    Some(slot) => slot,
                    None => halt(Fault::ResourceExhausted {
                        slots: arena.capacity(),
                    }),
                };
                mbox.pending.push_back(slot);
                log::trace!("mbox {}: buffered message of sender {}", id, sender.ctx);
                wakeups.insert(sender.ctx, Wakeup::Sent);
                wake.push(sender.ctx);
            }
            return Some(Ok(len));
        }

        // Nothing buffered: only a rendezvous mailbox can have senders here.
        let offered = mbox.blocked_senders.front()?.message.len();
        if offered > buf.len() {
            return Some(Err(IpcError::InvalidArgument));
        }
        let sender = mbox.blocked_senders.pop_front()?;
        buf[..offered].copy_from_slice(&sender.message);
        log::trace!("mbox {}: handoff from sender {}", id, sender.ctx);
        wakeups.insert(sender.ctx, Wakeup::Sent);
        wake.push(sender.ctx);
        Some(Ok(offered))
    }

    /// Take `ctx` off the queue it blocked on, if it is still there.
    fn withdraw(&mut self, ctx: ContextId, id: MailboxId, reason: BlockReason) -> bool {
        let Ok(mbox) = lookup(&mut self.mailboxes, id) else {
            return false;
        };
        match reason {
            BlockReason::BlockedOnSend => mbox.blocked_senders.remove(ctx).is_some(),
            BlockReason::BlockedOnReceive => mbox.blocked_receivers.remove(ctx).is_some(),
        }
    }

    fn is_queued(&mut self, ctx: ContextId, id: MailboxId, reason: BlockReason) -> bool {
        let Ok(mbox) = lookup(&mut self.mailboxes, id) else {
            return false;
        };
        match reason {
            BlockReason::BlockedOnSend => mbox.blocked_senders.contains(ctx),
            BlockReason::BlockedOnReceive => mbox.blocked_receivers.contains(ctx),
        }
    }
}

impl<S: Scheduler> MailboxSubsystem<S> {
    pub fn new(config: MailboxConfig, scheduler: S) -> Self {
        let mailboxes = (0..config.max_mailboxes).map(|_| Mailbox::empty()).collect();
        MailboxSubsystem {
            config,
            tables: Mutex::new(Tables {
                mailboxes,
                arena: SlotArena::new(config.max_slots, config.max_message),
                wakeups: BTreeMap::new(),
            }),
            scheduler,
        }
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Create a mailbox holding up to `capacity` messages of at most
    /// `max_message_size` bytes. The lowest free table index is used.
    pub fn create(&self, capacity: usize, max_message_size: usize) -> IpcResult<MailboxId> {
        self.create_tagged(capacity, max_message_size).map(|(id, _)| id)
    }

    /// [`create`](Self::create), also returning the generation of the new
    /// entry for use with the generation-checked calls.
    pub(crate) fn create_tagged(
        &self,
        capacity: usize,
        max_message_size: usize,
    ) -> IpcResult<(MailboxId, u64)> {
        if max_message_size == 0 || max_message_size > self.config.max_message {
            return Err(IpcError::InvalidArgument);
        }

        let mut tables = self.tables.lock();
        let Some(index) = tables
            .mailboxes
            .iter()
            .position(|mbox| mbox.status == MailboxStatus::Empty)
        else {
            log::warn!("mbox: table full ({} entries)", self.config.max_mailboxes);
            return Err(IpcError::InvalidArgument);
        };
        let id = MailboxId::from_usize(index);
        tables.mailboxes[index].open(capacity, max_message_size);
        let generation = tables.mailboxes[index].generation;
        drop(tables);

        log::debug!(
            "mbox {}: created ({:?}, capacity={}, max_size={})",
            id,
            MailboxKind::from_capacity(capacity),
            capacity,
            max_message_size
        );
        Ok((id, generation))
    }

    /// Tear down `id`, waking every blocked party with
    /// [`IpcError::MailboxReleased`] and discarding buffered messages.
    ///
    /// Returns [`IpcError::Interrupted`] if the caller has a pending signal;
    /// the mailbox is released regardless.
    pub fn free(&self, id: MailboxId) -> IpcResult<()> {
        let mut wake = Vec::new();
        let discarded;
        {
            let mut tables = self.tables.lock();
            let Tables {
                mailboxes,
                arena,
                wakeups,
            } = &mut *tables;
            let mbox = lookup(mailboxes, id)?;
            mbox.status = MailboxStatus::Released;

            for waiter in mbox.blocked_senders.drain() {
                wakeups.insert(waiter.ctx, Wakeup::Released);
                wake.push(waiter.ctx);
            }
            for waiter in mbox.blocked_receivers.drain() {
                wakeups.insert(waiter.ctx, Wakeup::Released);
                wake.push(waiter.ctx);
            }
            discarded = mbox.pending.len();
            while let Some(slot) = mbox.pending.pop_front() {
                arena.release(id, slot);
            }
            mbox.reset();
        }

        log::debug!(
            "mbox {}: released ({} waiters woken, {} messages discarded)",
            id,
            wake.len(),
            discarded
        );
        self.resume_all(wake);

        if self.scheduler.was_signaled() {
            return Err(IpcError::Interrupted);
        }
        Ok(())
    }

    /// Send `payload`, blocking while the mailbox is full (or, for a
    /// rendezvous mailbox, until a receiver takes it).
    pub fn send(&self, id: MailboxId, payload: &[u8]) -> IpcResult<()> {
        self.send_inner(id, payload, true)
    }

    /// Send `payload` only if that is possible without blocking.
    pub fn try_send(&self, id: MailboxId, payload: &[u8]) -> IpcResult<()> {
        self.send_inner(id, payload, false)
    }

    /// Receive the oldest message into `buf`, blocking while there is none.
    /// Returns the message length.
    pub fn receive(&self, id: MailboxId, buf: &mut [u8]) -> IpcResult<usize> {
        self.receive_inner(id, buf, true)
    }

    /// Receive the oldest message only if one is available without blocking.
    pub fn try_receive(&self, id: MailboxId, buf: &mut [u8]) -> IpcResult<usize> {
        self.receive_inner(id, buf, false)
    }

    pub(crate) fn send_inner(&self, id: MailboxId, payload: &[u8], wait: bool) -> IpcResult<()> {
        self.send_at(id, None, payload, wait)
    }

    pub(crate) fn receive_inner(&self, id: MailboxId, buf: &mut [u8], wait: bool) -> IpcResult<usize> {
        self.receive_at(id, None, buf, wait)
    }

    /// Send to `id` only while it is still the entry opened as
    /// `generation` (any generation if `None`).
    pub(crate) fn send_at(
        &self,
        id: MailboxId,
        generation: Option<u64>,
        payload: &[u8],
        wait: bool,
    ) -> IpcResult<()> {
        let me = wait.then(|| self.scheduler.current());
        let mut wake = Vec::new();

        let mut tables = self.tables.lock();
        if let Some(result) = tables.try_send(id, generation, payload, &mut wake) {
            drop(tables);
            self.resume_all(wake);
            return result;
        }
        let Some(me) = me else {
            drop(tables);
            self.resume_all(wake);
            return Err(IpcError::WouldBlock);
        };

        // Still in use: try_send would have returned the lookup error.
        if let Ok(mbox) = lookup(&mut tables.mailboxes, id) {
            mbox.blocked_senders.push_back(SendWaiter {
                ctx: me,
                message: payload.to_vec(),
            });
        }
        drop(tables);
        self.resume_all(wake);
        log::trace!("mbox {}: sender {} blocked", id, me);

        match self.block(me, id, BlockReason::BlockedOnSend)? {
            Woken::Served(_) => Ok(()),
            Woken::Unserved => self.send_at(id, generation, payload, false),
        }
    }

    /// Receive from `id` only while it is still the entry opened as
    /// `generation` (any generation if `None`).
    pub(crate) fn receive_at(
        &self,
        id: MailboxId,
        generation: Option<u64>,
        buf: &mut [u8],
        wait: bool,
    ) -> IpcResult<usize> {
        let me = wait.then(|| self.scheduler.current());
        let mut wake = Vec::new();

        let mut tables = self.tables.lock();
        if let Some(result) = tables.try_receive(id, generation, buf, &mut wake) {
            drop(tables);
            self.resume_all(wake);
            return result;
        }
        let Some(me) = me else {
            return Err(IpcError::WouldBlock);
        };

        if let Ok(mbox) = lookup(&mut tables.mailboxes, id) {
            mbox.blocked_receivers.push_back(RecvWaiter {
                ctx: me,
                buffer_len: buf.len(),
            });
        }
        drop(tables);
        log::trace!("mbox {}: receiver {} blocked", id, me);

        match self.block(me, id, BlockReason::BlockedOnReceive)? {
            Woken::Served(Wakeup::Message(message)) => {
                buf[..message.len()].copy_from_slice(&message);
                Ok(message.len())
            }
            Woken::Served(_) | Woken::Unserved => self.receive_at(id, generation, buf, false),
        }
    }

    /// Suspend the already-queued caller until someone serves it.
    fn block(&self, me: ContextId, id: MailboxId, reason: BlockReason) -> IpcResult<Woken> {
        loop {
            let cause = self.scheduler.suspend(reason);

            let mut tables = self.tables.lock();
            if let Some(wakeup) = tables.wakeups.remove(&me) {
                return match wakeup {
                    Wakeup::Released => Err(IpcError::MailboxReleased),
                    Wakeup::Rejected => Err(IpcError::InvalidArgument),
                    served => Ok(Woken::Served(served)),
                };
            }

            match cause {
                WakeCause::Signaled => {
                    tables.withdraw(me, id, reason);
                    log::trace!("mbox {}: context {} interrupted", id, me);
                    return Err(IpcError::Interrupted);
                }
                WakeCause::Resumed if tables.is_queued(me, id, reason) => continue,
                WakeCause::Resumed => return Ok(Woken::Unserved),
            }
        }
    }

    fn resume_all(&self, wake: Vec<ContextId>) {
        for ctx in wake {
            self.scheduler.resume(ctx);
        }
    }

    /// Snapshot of an in-use mailbox.
    pub fn info(&self, id: MailboxId) -> IpcResult<MailboxInfo> {
        let mut tables = self.tables.lock();
        lookup(&mut tables.mailboxes, id).map(|mbox| mbox.info(id))
    }

    /// Status of table entry `id`, or `None` if `id` is out of range.
    pub fn status(&self, id: MailboxId) -> Option<MailboxStatus> {
        let tables = self.tables.lock();
        tables.mailboxes.get(id.as_usize()).map(|mbox| mbox.status)
    }

    /// Number of mailboxes currently in use.
    pub fn in_use(&self) -> usize {
        let tables = self.tables.lock();
        tables
            .mailboxes
            .iter()
            .filter(|mbox| mbox.status == MailboxStatus::InUse)
            .count()
    }

    /// Slots left in the shared arena.
    pub fn free_slots(&self) -> usize {
        self.tables.lock().arena.free_count()
    }
}
