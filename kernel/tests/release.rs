//! Tearing a mailbox down while contexts are blocked on it.

use mailbox_kernel::{
    process::ThreadScheduler, IpcError, MailboxConfig, MailboxId, MailboxStatus, MailboxSubsystem,
    Scheduler,
};
use std::sync::Arc;

type Mailboxes = MailboxSubsystem<Arc<ThreadScheduler>>;

fn setup(config: MailboxConfig) -> (Arc<ThreadScheduler>, Arc<Mailboxes>) {
    mailbox_kernel::logger::init();
    let sched = Arc::new(ThreadScheduler::new());
    let mailboxes = Arc::new(MailboxSubsystem::new(config, Arc::clone(&sched)));
    (sched, mailboxes)
}

fn receive_once(mailboxes: Arc<Mailboxes>, id: MailboxId) -> impl FnOnce() -> Result<usize, IpcError> {
    move || {
        let mut buf = [0u8; 16];
        mailboxes.receive(id, &mut buf)
    }
}

#[test]
fn test_free_releases_every_blocked_receiver() {
    let (sched, mb) = setup(MailboxConfig::default());
    let id = mb.create(2, 16).unwrap();

    let receivers: Vec<_> = (0..4)
        .map(|_| {
            let handle = sched.spawn("receiver", receive_once(Arc::clone(&mb), id));
            sched.wait_until_blocked(handle.id()).unwrap();
            handle
        })
        .collect();
    assert_eq!(mb.info(id).unwrap().blocked_receivers, 4);

    mb.free(id).unwrap();
    for receiver in receivers {
        assert_eq!(receiver.join().unwrap(), Err(IpcError::MailboxReleased));
    }

    assert_eq!(mb.status(id), Some(MailboxStatus::Empty));
    let mut buf = [0u8; 16];
    assert_eq!(mb.receive(id, &mut buf), Err(IpcError::InvalidArgument));
    assert_eq!(mb.send(id, b"x"), Err(IpcError::InvalidArgument));
}

#[test]
fn test_free_releases_blocked_senders_and_slots() {
    let (sched, mb) = setup(MailboxConfig::default().with_max_slots(16));
    let id = mb.create(1, 16).unwrap();
    mb.send(id, b"queued").unwrap();
    assert_eq!(mb.free_slots(), 15);

    let senders: Vec<_> = (0..2)
        .map(|_| {
            let inner = Arc::clone(&mb);
            let handle = sched.spawn("sender", move || inner.send(id, b"blocked"));
            sched.wait_until_blocked(handle.id()).unwrap();
            handle
        })
        .collect();

    mb.free(id).unwrap();
    for sender in senders {
        assert_eq!(sender.join().unwrap(), Err(IpcError::MailboxReleased));
    }
    assert_eq!(mb.free_slots(), 16);
}

#[test]
fn test_free_releases_rendezvous_parties() {
    let (sched, mb) = setup(MailboxConfig::default());
    let id = mb.create(0, 16).unwrap();

    let inner = Arc::clone(&mb);
    let sender = sched.spawn("sender", move || inner.send(id, b"never"));
    sched.wait_until_blocked(sender.id()).unwrap();

    mb.free(id).unwrap();
    assert_eq!(sender.join().unwrap(), Err(IpcError::MailboxReleased));
}

#[test]
fn test_recreated_mailbox_starts_clean() {
    let (_sched, mb) = setup(MailboxConfig::default());
    let id = mb.create(3, 16).unwrap();
    mb.send(id, b"stale").unwrap();
    mb.send(id, b"stale").unwrap();
    mb.free(id).unwrap();

    let again = mb.create(2, 8).unwrap();
    assert_eq!(again, id);
    let info = mb.info(again).unwrap();
    assert_eq!(info.pending, 0);
    assert_eq!(info.capacity, 2);
    assert_eq!(info.max_message_size, 8);
    let mut buf = [0u8; 8];
    assert_eq!(mb.try_receive(again, &mut buf), Err(IpcError::WouldBlock));
}

#[test]
fn test_free_twice_is_invalid() {
    let (_sched, mb) = setup(MailboxConfig::default());
    let id = mb.create(1, 4).unwrap();
    assert_eq!(mb.free(id), Ok(()));
    assert_eq!(mb.free(id), Err(IpcError::InvalidArgument));
}

#[test]
fn test_signaled_caller_still_releases() {
    let (sched, mb) = setup(MailboxConfig::default());
    let id = mb.create(1, 4).unwrap();

    let me = sched.current();
    sched.signal(me);
    assert_eq!(mb.free(id), Err(IpcError::Interrupted));
    assert_eq!(mb.status(id), Some(MailboxStatus::Empty));
    sched.clear_signal(me);
}

#[test]
fn test_other_mailboxes_survive_release() {
    let (sched, mb) = setup(MailboxConfig::default());
    let doomed = mb.create(1, 8).unwrap();
    let survivor = mb.create(1, 8).unwrap();

    let inner = Arc::clone(&mb);
    let waiter = sched.spawn("waiter", receive_once(Arc::clone(&mb), survivor));
    sched.wait_until_blocked(waiter.id()).unwrap();

    mb.free(doomed).unwrap();
    assert_eq!(mb.info(survivor).unwrap().blocked_receivers, 1);

    inner.send(survivor, b"ok").unwrap();
    assert_eq!(waiter.join().unwrap(), Ok(2));
}
