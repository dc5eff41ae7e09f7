// Blocked-party bookkeeping for the mailbox table

pub mod waitqueue;

pub use waitqueue::{WaitQueue, Waiter};
