// Point-to-point messaging over the mailbox store

use super::world::World;
use crate::error::{Error, Result};
use crate::Mailbox::Structs::{Source, Status, Tag, TagFilter};
use crate::Mailbox::matcher;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A rank's view of its world; every messaging operation goes through it.
pub struct Communicator {
    rank: usize,
    world: World,
    initialized: bool,
    finalized: bool,
}

impl Communicator {
    pub(crate) fn new(rank: usize, world: World) -> Self {
        Self {
            rank,
            world,
            initialized: false,
            finalized: false,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.world.size()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Collective start-up: no rank returns before every rank has called it.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.world.is_finalized() {
            return Err(Error::Finalized);
        }
        self.world.barrier_wait("init", self.world.config().timeout)?;
        self.initialized = true;
        if self.rank == 0 {
            log::debug!("all {} rank(s) initialized", self.size());
        }
        Ok(())
    }

    /// Collective tear-down.
    ///
    /// All ranks meet at a barrier, rank 0 releases the mailbox region, and a
    /// second barrier keeps every rank in the call until the release is done.
    /// Calling it again on the same rank is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        let timeout = self.world.config().timeout;
        self.world.barrier_wait("finalize", timeout)?;
        if self.rank == 0 && self.world.store().release() {
            log::debug!("rank 0 released the mailbox region");
        }
        self.world.barrier_wait("finalize", timeout)?;
        self.finalized = true;
        Ok(())
    }

    /// Wall-clock time in seconds.
    pub fn wtime(&self) -> f64 {
        wtime()
    }

    /// Terminate the whole process with `code`.
    pub fn abort(&self, code: i32) -> ! {
        log::error!("rank {} aborting with code {}", self.rank, code);
        std::process::exit(code)
    }

    // ---------------------------------------------------------------------
    // Send
    // ---------------------------------------------------------------------

    /// Install `payload` in `dest`'s mailbox, blocking while it is occupied.
    ///
    /// Returns once the message is installed; delivery is not awaited.
    pub fn send(&self, payload: &[u8], dest: usize, tag: Tag) -> Result<()> {
        self.send_inner(payload, dest, tag, self.world.config().timeout)
    }

    /// Like [`send`](Self::send) but gives up after `timeout`.
    pub fn send_timeout(&self, payload: &[u8], dest: usize, tag: Tag, timeout: Duration) -> Result<()> {
        self.send_inner(payload, dest, tag, Some(timeout))
    }

    fn send_inner(&self, payload: &[u8], dest: usize, tag: Tag, timeout: Option<Duration>) -> Result<()> {
        self.check_active()?;
        self.check_rank(dest)?;
        check_tag(tag)?;

        let store = self.world.store();
        let config = self.world.config();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut waits = 0u64;

        loop {
            let mut guard = store.lock()?;
            if !matcher::is_occupied(guard.slot(dest), dest) {
                guard.install(dest, self.rank, tag, payload);
                drop(guard);
                store.notify();
                if waits > 0 {
                    log::trace!("rank {} waited {} time(s) for rank {}'s mailbox", self.rank, waits, dest);
                }
                return Ok(());
            }
            let ticket = guard.ticket();
            drop(guard);

            expire("send", timeout, deadline)?;
            store.park(ticket, config.wait_strategy, config.poll_interval, deadline);
            waits += 1;
        }
    }

    // ---------------------------------------------------------------------
    // Receive
    // ---------------------------------------------------------------------

    /// Block until a matching message is in this rank's mailbox and take it.
    ///
    /// Ownership of the payload buffer moves to the caller.
    pub fn recv(&self, source: impl Into<Source>, tag: impl Into<TagFilter>) -> Result<(Vec<u8>, Status)> {
        let (status, payload) =
            self.recv_inner(source.into(), tag.into(), None, self.world.config().timeout)?;
        Ok((payload.into_vec(), status))
    }

    pub fn recv_timeout(
        &self,
        source: impl Into<Source>,
        tag: impl Into<TagFilter>,
        timeout: Duration,
    ) -> Result<(Vec<u8>, Status)> {
        let (status, payload) = self.recv_inner(source.into(), tag.into(), None, Some(timeout))?;
        Ok((payload.into_vec(), status))
    }

    /// Block until a matching message arrives and copy it into `buf`.
    ///
    /// A message longer than `buf` is left in the mailbox and reported as
    /// [`Error::BufferTooSmall`].
    pub fn recv_into(&self, buf: &mut [u8], source: impl Into<Source>, tag: impl Into<TagFilter>) -> Result<Status> {
        let (status, payload) =
            self.recv_inner(source.into(), tag.into(), Some(buf.len()), self.world.config().timeout)?;
        buf[..status.len].copy_from_slice(&payload);
        Ok(status)
    }

    pub fn recv_into_timeout(
        &self,
        buf: &mut [u8],
        source: impl Into<Source>,
        tag: impl Into<TagFilter>,
        timeout: Duration,
    ) -> Result<Status> {
        let (status, payload) = self.recv_inner(source.into(), tag.into(), Some(buf.len()), Some(timeout))?;
        buf[..status.len].copy_from_slice(&payload);
        Ok(status)
    }

    fn recv_inner(
        &self,
        source: Source,
        tag: TagFilter,
        capacity: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<(Status, Box<[u8]>)> {
        self.check_active()?;
        self.check_filter(source, tag)?;

        let store = self.world.store();
        let config = self.world.config();
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let mut guard = store.lock()?;
            if guard.matches(self.rank, source, tag) {
                if let (Some(available), Some(status)) = (capacity, guard.peek(self.rank)) {
                    if status.len > available {
                        return Err(Error::BufferTooSmall {
                            needed: status.len,
                            available,
                        });
                    }
                }
                if let Some(taken) = guard.take(self.rank) {
                    drop(guard);
                    store.notify();
                    return Ok(taken);
                }
            }
            let ticket = guard.ticket();
            drop(guard);

            expire("recv", timeout, deadline)?;
            store.park(ticket, config.wait_strategy, config.poll_interval, deadline);
        }
    }

    // ---------------------------------------------------------------------
    // Probe
    // ---------------------------------------------------------------------

    /// Check, without blocking or consuming, for a matching message.
    pub fn probe(&self, source: impl Into<Source>, tag: impl Into<TagFilter>) -> Result<Option<Status>> {
        let (source, tag) = (source.into(), tag.into());
        self.check_active()?;
        self.check_filter(source, tag)?;

        let guard = self.world.store().lock()?;
        if guard.matches(self.rank, source, tag) {
            Ok(guard.peek(self.rank))
        } else {
            Ok(None)
        }
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    pub(crate) fn check_active(&self) -> Result<()> {
        if self.finalized || self.world.is_finalized() {
            return Err(Error::Finalized);
        }
        if !self.initialized {
            return Err(Error::NotInitialized(self.rank));
        }
        Ok(())
    }

    pub(crate) fn check_rank(&self, rank: usize) -> Result<()> {
        let size = self.size();
        if rank >= size {
            return Err(Error::InvalidRank { rank, size });
        }
        Ok(())
    }

    fn check_filter(&self, source: Source, tag: TagFilter) -> Result<()> {
        if let Source::Rank(rank) = source {
            self.check_rank(rank)?;
        }
        if let TagFilter::Tag(tag) = tag {
            check_tag(tag)?;
        }
        Ok(())
    }
}

fn check_tag(tag: Tag) -> Result<()> {
    if tag < 0 {
        return Err(Error::InvalidArgument(format!("tag must be non-negative, got {}", tag)));
    }
    Ok(())
}

/// Fail with a timeout once `deadline` has passed.
fn expire(op: &'static str, timeout: Option<Duration>, deadline: Option<Instant>) -> Result<()> {
    match (timeout, deadline) {
        (Some(after), Some(deadline)) if Instant::now() >= deadline => {
            log::warn!("{} gave up after {:?}", op, after);
            Err(Error::Timeout { op, after })
        }
        _ => Ok(()),
    }
}

/// Seconds since the Unix epoch.
pub fn wtime() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
