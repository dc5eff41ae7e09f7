//! Kernel halt path.
//!
//! The messaging core has no supervisor to restart it: a [`Fault`] stops
//! the whole system. On a hosted build the halt is a panic carrying the
//! fault message, which unwinds the offending context.

use crate::error::Fault;

/// Log the fault and stop the system.
#[cold]
#[track_caller]
pub fn halt(fault: Fault) -> ! {
    log::error!("kernel halt: {}", fault);
    panic!("kernel halt: {}", fault)
}
