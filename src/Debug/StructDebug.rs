use std::fmt;
use crate::Comm::{Communicator, World};
use crate::Mailbox::MailboxStore;

/// Debug function for MailboxStore
///
/// Takes the store lock to report counters; a released store only shows its size.
pub fn debug_mailbox_store(store: &MailboxStore, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("MailboxStore");
    s.field("ranks", &store.ranks());
    match store.lock() {
        Ok(guard) => {
            let header = guard.header();
            let stats = guard.stats();
            s.field("shm", &"<opaque>")
                .field("version", &header.version)
                .field("installs", &stats.installs)
                .field("removals", &stats.removals)
                .field("resident", &stats.resident)
                .finish()
        }
        Err(_) => s.field("released", &true).finish(),
    }
}

/// Debug function for World
pub fn debug_world(world: &World, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let config = world.config();
    f.debug_struct("World")
        .field("ranks", &config.ranks)
        .field("wait_strategy", &config.wait_strategy)
        .field("poll_interval", &config.poll_interval)
        .field("timeout", &config.timeout)
        .field("finalized", &world.is_finalized())
        .finish_non_exhaustive()
}

/// Debug function for Communicator
///
/// Does not touch the store, so it is safe to format while a send is parked.
pub fn debug_communicator(comm: &Communicator, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Communicator")
        .field("rank", &comm.rank())
        .field("size", &comm.size())
        .field("initialized", &comm.is_initialized())
        .field("finalized", &comm.is_finalized())
        .finish()
}
