//! System-wide limits for the messaging subsystem.
//!
//! The defaults are the limits of the reference machine. Tests usually
//! shrink them through the `with_*` setters so that table and
//! arena exhaustion can be reached quickly.

/// Number of entries in the mailbox table.
pub const MAX_MAILBOXES: usize = 2000;

/// Number of cells in the shared slot arena.
pub const MAX_SLOTS: usize = 2500;

/// Largest payload, in bytes, any mailbox may accept.
pub const MAX_MESSAGE: usize = 150;

/// Size of a device completion status (a little-endian `u32`).
pub const DEVICE_STATUS_SIZE: usize = core::mem::size_of::<u32>();

/// Capacity of the mailbox behind each disk and terminal device.
pub const IO_MAILBOX_SLOTS: usize = 1;

static_assertions::const_assert!(DEVICE_STATUS_SIZE <= MAX_MESSAGE);
static_assertions::const_assert!(IO_MAILBOX_SLOTS >= 1);

/// Sizing of one [`MailboxSubsystem`](crate::ipc::MailboxSubsystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxConfig {
    pub max_mailboxes: usize,
    pub max_slots: usize,
    pub max_message: usize,
    pub io_mailbox_slots: usize,
}

impl MailboxConfig {
    pub const fn new() -> Self {
        MailboxConfig {
            max_mailboxes: MAX_MAILBOXES,
            max_slots: MAX_SLOTS,
            max_message: MAX_MESSAGE,
            io_mailbox_slots: IO_MAILBOX_SLOTS,
        }
    }

    pub const fn with_max_mailboxes(mut self, count: usize) -> Self {
        self.max_mailboxes = count;
        self
    }

    pub const fn with_max_slots(mut self, count: usize) -> Self {
        self.max_slots = count;
        self
    }

    pub const fn with_max_message(mut self, bytes: usize) -> Self {
        self.max_message = bytes;
        self
    }

    /// Capacity of the disk / terminal mailboxes. Values below 1 are
    /// raised to 1: an I/O mailbox must be able to hold a completion that
    /// arrives before anyone waits for it.
    pub const fn with_io_mailbox_slots(mut self, count: usize) -> Self {
        self.io_mailbox_slots = if count == 0 { 1 } else { count };
        self
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = MailboxConfig::default();
        assert_eq!(config.max_mailboxes, MAX_MAILBOXES);
        assert_eq!(config.max_slots, MAX_SLOTS);
        assert_eq!(config.max_message, MAX_MESSAGE);
        assert_eq!(config.io_mailbox_slots, IO_MAILBOX_SLOTS);
    }

    #[test]
    fn test_io_slots_never_zero() {
        let config = MailboxConfig::new().with_io_mailbox_slots(0);
        assert_eq!(config.io_mailbox_slots, 1);
        let config = MailboxConfig::new().with_io_mailbox_slots(4);
        assert_eq!(config.io_mailbox_slots, 4);
    }
}
