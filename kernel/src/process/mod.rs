//! Scheduler and privilege collaborators.
//!
//! The messaging core never schedules anything itself. It asks the
//! [`Scheduler`] who is running, suspends the caller when a blocking call
//! cannot complete, and resumes the parties it has served. Privilege
//! checks go through [`Privilege`].
//!
//! With the `std` feature, [`ThreadScheduler`] implements both traits on
//! top of OS threads.

use core::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "std")]
mod thread;

#[cfg(feature = "std")]
pub use thread::{ContextHandle, ThreadScheduler};

/// Identity of an execution context (a kernel process / thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Generate a new unique context id.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        ContextId(raw)
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ContextId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a context is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    BlockedOnSend,
    BlockedOnReceive,
}

/// Why a suspended context is running again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Another context called [`Scheduler::resume`].
    Resumed,
    /// A signal was delivered to this context while it was suspended.
    Signaled,
}

/// Scheduler capability used by the blocking mailbox paths.
///
/// A `resume` that arrives before the target has reached `suspend` must
/// not be lost: the next `suspend` of that context returns immediately.
pub trait Scheduler: Send + Sync {
    /// Identity of the calling context.
    fn current(&self) -> ContextId;

    /// Suspend the calling context until it is resumed or signaled.
    fn suspend(&self, reason: BlockReason) -> WakeCause;

    /// Make `ctx` runnable again. Returns `false` if `ctx` is unknown.
    fn resume(&self, ctx: ContextId) -> bool;

    /// Whether a signal is pending for the calling context.
    fn was_signaled(&self) -> bool;
}

/// Privilege collaborator: is the caller running in kernel mode?
pub trait Privilege: Send + Sync {
    fn is_privileged(&self) -> bool;
}

impl<T: Scheduler + ?Sized> Scheduler for alloc::sync::Arc<T> {
    fn current(&self) -> ContextId {
        (**self).current()
    }

    fn suspend(&self, reason: BlockReason) -> WakeCause {
        (**self).suspend(reason)
    }

    fn resume(&self, ctx: ContextId) -> bool {
        (**self).resume(ctx)
    }

    fn was_signaled(&self) -> bool {
        (**self).was_signaled()
    }
}

impl<T: Privilege + ?Sized> Privilege for alloc::sync::Arc<T> {
    fn is_privileged(&self) -> bool {
        (**self).is_privileged()
    }
}
