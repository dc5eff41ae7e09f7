//! Mailbox messaging core for a teaching kernel.
//!
//! The crate implements the kernel's IPC layer:
//! - [`ipc`]: the slot arena, the mailbox table and the create / send /
//!   receive / free operations
//! - [`sync`]: FIFO queues of blocked execution contexts
//! - [`devices`]: the device bridge mapping completion interrupts onto
//!   per-device mailboxes
//! - [`syscall`]: the system call vector in front of the mailbox API
//!
//! The scheduler, device and privilege subsystems are collaborators
//! described by the traits in [`process`] and [`devices`]. With the `std`
//! feature (default) the crate also ships hosted implementations of them
//! backed by OS threads, which is what the test suite runs on.
//!
//! # Features
//!
//! - `std`: hosted collaborators and the console logger

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod devices;
pub mod error;
pub mod ipc;
#[cfg(feature = "std")]
pub mod logger;
pub mod panic;
pub mod process;
pub mod sync;
pub mod syscall;

mod messaging;

pub use config::MailboxConfig;
pub use devices::{DeviceBridge, DeviceRegistry, InterruptEvent, InterruptKind, InterruptPort};
pub use error::{Fault, IpcError, IpcResult};
pub use ipc::{MailboxId, MailboxInfo, MailboxKind, MailboxStatus, MailboxSubsystem};
pub use messaging::Messaging;
pub use process::{BlockReason, ContextId, Privilege, Scheduler, WakeCause};
pub use syscall::{SyscallFrame, SyscallVector};
