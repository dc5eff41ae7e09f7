//! Hosted scheduler: every execution context is an OS thread.
//!
//! Suspension is a wait on a condition variable shared by all contexts of
//! one scheduler. Each context carries a `wake_pending` flag, set by
//! [`resume`](Scheduler::resume) and consumed by
//! [`suspend`](Scheduler::suspend), so a resume that races ahead of the
//! target's suspend is never lost:
//!
//! ```text
//!   waiter                          waker
//!   lock tables, enqueue self
//!   unlock tables
//!                                   lock tables, dequeue waiter
//!                                   unlock tables, resume(waiter)  → wake_pending = true
//!   suspend()                       ← sees wake_pending, returns at once
//! ```
//!
//! Threads that were not spawned through the scheduler (a test's main
//! thread, for instance) are adopted as privileged contexts the first time
//! they call into it.

use super::{BlockReason, ContextId, Privilege, Scheduler, WakeCause};
use std::{
    cell::Cell,
    collections::BTreeMap,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// How long [`ThreadScheduler::wait_until_blocked`] waits before giving up.
const BLOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

thread_local! {
    static CURRENT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Blocked(BlockReason),
    Exited,
}

struct ContextState {
    name: String,
    state: RunState,
    wake_pending: bool,
    signaled: bool,
    privileged: bool,
}

impl ContextState {
    fn new(name: &str, privileged: bool) -> Self {
        ContextState {
            name: name.to_string(),
            state: RunState::Running,
            wake_pending: false,
            signaled: false,
            privileged,
        }
    }
}

/// A [`Scheduler`] and [`Privilege`] implementation over OS threads.
pub struct ThreadScheduler {
    contexts: Mutex<BTreeMap<ContextId, ContextState>>,
    changed: Condvar,
}

/// Join handle for a context started with [`ThreadScheduler::spawn`].
pub struct ContextHandle<T> {
    id: ContextId,
    thread: JoinHandle<T>,
}

impl<T> ContextHandle<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Wait for the context to exit. `Err` carries the panic payload if the
    /// context halted.
    pub fn join(self) -> thread::Result<T> {
        self.thread.join()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Marks the context exited when its thread unwinds or returns.
struct ExitGuard {
    scheduler: Arc<ThreadScheduler>,
    id: ContextId,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut contexts = self.scheduler.contexts();
        if let Some(ctx) = contexts.get_mut(&self.id) {
            ctx.state = RunState::Exited;
        }
        drop(contexts);
        self.scheduler.changed.notify_all();
    }
}

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler {
            contexts: Mutex::new(BTreeMap::new()),
            changed: Condvar::new(),
        }
    }

    fn contexts(&self) -> MutexGuard<'_, BTreeMap<ContextId, ContextState>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a privileged (kernel-mode) context running `f`.
    pub fn spawn<F, T>(self: &Arc<Self>, name: &str, f: F) -> ContextHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with(name, true, f)
    }

    /// Start an unprivileged (user-mode) context running `f`.
    pub fn spawn_user<F, T>(self: &Arc<Self>, name: &str, f: F) -> ContextHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with(name, false, f)
    }

    fn spawn_with<F, T>(self: &Arc<Self>, name: &str, privileged: bool, f: F) -> ContextHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = ContextId::new();
        self.contexts().insert(id, ContextState::new(name, privileged));

        let scheduler = Arc::clone(self);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                CURRENT.with(|cell| cell.set(Some(id)));
                let _exit = ExitGuard { scheduler, id };
                f()
            })
            .expect("failed to spawn context thread");

        log::trace!("sched: spawned context {} ({})", id, name);
        ContextHandle { id, thread }
    }

    /// Deliver a signal to `ctx`. A suspended context wakes with
    /// [`WakeCause::Signaled`]; the signal stays pending until cleared.
    pub fn signal(&self, ctx: ContextId) -> bool {
        let found = match self.contexts().get_mut(&ctx) {
            Some(state) => {
                state.signaled = true;
                true
            }
            None => false,
        };
        self.changed.notify_all();
        found
    }

    pub fn clear_signal(&self, ctx: ContextId) {
        if let Some(state) = self.contexts().get_mut(&ctx) {
            state.signaled = false;
        }
    }

    /// The reason `ctx` is suspended, or `None` if it is running or gone.
    pub fn blocked_on(&self, ctx: ContextId) -> Option<BlockReason> {
        match self.contexts().get(&ctx).map(|state| state.state) {
            Some(RunState::Blocked(reason)) => Some(reason),
            _ => None,
        }
    }

    /// Number of contexts currently suspended.
    pub fn blocked_count(&self) -> usize {
        self.contexts()
            .values()
            .filter(|state| matches!(state.state, RunState::Blocked(_)))
            .count()
    }

    /// Wait until `ctx` is suspended and return why.
    ///
    /// Returns `None` if `ctx` exits first or does not block within
    /// [`BLOCK_WAIT_TIMEOUT`].
    pub fn wait_until_blocked(&self, ctx: ContextId) -> Option<BlockReason> {
        let deadline = Instant::now() + BLOCK_WAIT_TIMEOUT;
        let mut contexts = self.contexts();
        loop {
            match contexts.get(&ctx).map(|state| state.state) {
                Some(RunState::Blocked(reason)) => return Some(reason),
                Some(RunState::Exited) | None => return None,
                Some(RunState::Running) => {}
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!("sched: context {} did not block in time", ctx);
                return None;
            }
            contexts = self
                .changed
                .wait_timeout(contexts, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn name_of(&self, ctx: ContextId) -> String {
        self.contexts()
            .get(&ctx)
            .map(|state| state.name.clone())
            .unwrap_or_default()
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn current(&self) -> ContextId {
        let id = CURRENT.with(|cell| match cell.get() {
            Some(id) => id,
            None => {
                let id = ContextId::new();
                cell.set(Some(id));
                id
            }
        });
        self.contexts()
            .entry(id)
            .or_insert_with(|| ContextState::new("adopted", true));
        id
    }

    fn suspend(&self, reason: BlockReason) -> WakeCause {
        let id = self.current();
        let mut contexts = self.contexts();
        loop {
            let Some(state) = contexts.get_mut(&id) else {
                return WakeCause::Resumed;
            };
            if state.wake_pending {
                state.wake_pending = false;
                state.state = RunState::Running;
                drop(contexts);
                self.changed.notify_all();
                return WakeCause::Resumed;
            }
            if state.signaled {
                state.state = RunState::Running;
                drop(contexts);
                self.changed.notify_all();
                return WakeCause::Signaled;
            }
            if state.state != RunState::Blocked(reason) {
                state.state = RunState::Blocked(reason);
                self.changed.notify_all();
            }
            contexts = self
                .changed
                .wait(contexts)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn resume(&self, ctx: ContextId) -> bool {
        let found = match self.contexts().get_mut(&ctx) {
            Some(state) => {
                state.wake_pending = true;
                true
            }
            None => false,
        };
        if found {
            log::trace!("sched: resume context {} ({})", ctx, self.name_of(ctx));
        }
        self.changed.notify_all();
        found
    }

    fn was_signaled(&self) -> bool {
        let id = self.current();
        self.contexts()
            .get(&id)
            .map(|state| state.signaled)
            .unwrap_or(false)
    }
}

impl Privilege for ThreadScheduler {
    fn is_privileged(&self) -> bool {
        let id = self.current();
        self.contexts()
            .get(&id)
            .map(|state| state.privileged)
            .unwrap_or(false)
    }
}
