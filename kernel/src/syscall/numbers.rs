//! Syscall number constants.
//!
//! The mailbox calls live in the IPC block starting at 20. Every other
//! entry of the vector is unassigned.

/// Size of the system call vector.
pub const MAX_SYSCALLS: usize = 50;

/// Create a mailbox. arg0 = capacity, arg1 = max message size.
/// Returns the mailbox id.
pub const SYS_MBOX_CREATE: u64 = 20;

/// Release a mailbox. arg0 = mailbox id.
pub const SYS_MBOX_FREE: u64 = 21;

/// Send `buffer[..arg1]` to mailbox arg0. Blocks while the mailbox is full.
pub const SYS_MBOX_SEND: u64 = 22;

/// Receive from mailbox arg0 into `buffer` (at most arg1 bytes).
/// Blocks while the mailbox is empty. Returns the message length.
pub const SYS_MBOX_RECEIVE: u64 = 23;

/// Like [`SYS_MBOX_SEND`] but fails with `WouldBlock` instead of blocking.
pub const SYS_MBOX_COND_SEND: u64 = 24;

/// Like [`SYS_MBOX_RECEIVE`] but fails with `WouldBlock` instead of blocking.
pub const SYS_MBOX_COND_RECEIVE: u64 = 25;

/// Wait for the device named by `buffer` (UTF-8). Returns its status.
pub const SYS_WAIT_DEVICE: u64 = 26;

static_assertions::const_assert!((SYS_WAIT_DEVICE as usize) < MAX_SYSCALLS);
