//! System call interface in front of the mailbox API.
//!
//! A trap hands the kernel a [`SyscallFrame`]; the [`SyscallVector`] picks
//! the handler by number, the handler decodes the raw arguments, runs the
//! mailbox operation and writes the raw result back into `ret`
//! (non-negative on success, an [`IpcError`](crate::error::IpcError) code
//! otherwise).

pub mod dispatcher;
pub mod numbers;

pub use dispatcher::{SyscallHandler, SyscallVector};

use alloc::vec::Vec;

/// Arguments and result of one system call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyscallFrame {
    pub number: u64,
    pub args: [i64; 4],
    /// Payload going in (send, wait-device name) or out (receive).
    pub buffer: Vec<u8>,
    pub ret: i64,
}

impl SyscallFrame {
    pub fn new(number: u64) -> Self {
        SyscallFrame {
            number,
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: &[i64]) -> Self {
        for (slot, arg) in self.args.iter_mut().zip(args) {
            *slot = *arg;
        }
        self
    }

    pub fn with_buffer(mut self, buffer: &[u8]) -> Self {
        self.buffer = buffer.to_vec();
        self
    }
}
