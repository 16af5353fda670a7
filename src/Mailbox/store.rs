use crate::Comm::builder::WaitStrategy;
use crate::Core::futex::{futex_wait, futex_wake_all};
use crate::Core::SharedMemory::{create_shared_memory, SharedMemoryBackend, REGION_ALIGN};
use crate::error::{Error, Result};
use crate::Mailbox::layout::{self, MailboxHeader, SlotHeader, LAYOUT_VERSION, MAGIC_NUMBER};
use crate::Mailbox::matcher;
use crate::Mailbox::Structs::{MailboxStats, Source, Status, Tag, TagFilter};
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Longest a notified waiter sleeps before re-checking on its own.
const NOTIFY_RECHECK: Duration = Duration::from_millis(50);

/// The mapped mailbox table plus the payload buffers owned by its slots.
pub(crate) struct Mailboxes {
    pub(crate) shm: Box<dyn SharedMemoryBackend>,
    header: *mut MailboxHeader,
    slots: *mut SlotHeader,
    payloads: Vec<Option<Box<[u8]>>>,
}

// Raw pointers into the region are only dereferenced behind the store lock
unsafe impl Send for Mailboxes {}

/// One mailbox slot per rank, guarded by a single global lock.
///
/// Slot metadata lives in a shared memory region; each payload is a heap
/// buffer owned by its slot until a receive moves it out.
pub struct MailboxStore {
    ranks: usize,
    inner: Mutex<Option<Mailboxes>>,
    /// Bumped after every slot mutation; notified waiters park on it.
    signal: CachePadded<AtomicU32>,
}

impl MailboxStore {
    /// Map a region for `ranks` slots and mark every slot empty.
    pub fn new(ranks: usize, region_name: &str) -> Result<Self> {
        if ranks == 0 || ranks > i32::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "rank count must be in 1..={}, got {}",
                i32::MAX,
                ranks
            )));
        }

        let size = layout::region_size(ranks);
        let shm = create_shared_memory(size, region_name).map_err(|e| {
            log::error!("failed to create mailbox region {}: {}", region_name, e);
            Error::Resource(format!(
                "mailbox region {}:\n\
                ├─ Slots:  {ranks}\n\
                ├─ Size:   {size}\n\
                ╰─ Error: {e}",
                region_name
            ))
        })?;

        let header = shm.as_ptr() as *mut MailboxHeader;
        if (header as usize) % REGION_ALIGN != 0 {
            return Err(Error::Resource(
                "shared memory not properly aligned".to_string(),
            ));
        }
        let slots = unsafe { shm.as_ptr().add(layout::slot_offset()) } as *mut SlotHeader;

        unsafe {
            std::ptr::write(
                header,
                MailboxHeader {
                    magic: MAGIC_NUMBER,
                    version: LAYOUT_VERSION,
                    rank_count: ranks as u32,
                    slot_offset: layout::slot_offset() as u64,
                    installs: 0,
                    removals: 0,
                },
            );
            for rank in 0..ranks {
                std::ptr::write(slots.add(rank), SlotHeader::EMPTY);
            }
        }

        log::debug!(
            "mailbox store ready: {} slots in region {}",
            ranks,
            shm.name()
        );

        Ok(Self {
            ranks,
            inner: Mutex::new(Some(Mailboxes {
                shm,
                header,
                slots,
                payloads: (0..ranks).map(|_| None).collect(),
            })),
            signal: CachePadded::new(AtomicU32::new(0)),
        })
    }

    pub fn ranks(&self) -> usize {
        self.ranks
    }

    /// Acquire the global lock.
    pub fn lock(&self) -> Result<MailboxGuard<'_>> {
        let guard = self.inner.lock();
        if guard.is_none() {
            return Err(Error::Finalized);
        }
        Ok(MailboxGuard {
            guard,
            ticket: self.signal.load(Ordering::Acquire),
        })
    }

    /// Tell parked waiters that some slot changed.
    pub fn notify(&self) {
        self.signal.fetch_add(1, Ordering::Release);
        futex_wake_all(&self.signal);
    }

    /// Wait for the next chance to re-check a slot predicate.
    ///
    /// `ticket` must have been read under the lock that observed the predicate
    /// as false, so a mutation made after that check is never missed.
    pub fn park(
        &self,
        ticket: u32,
        strategy: WaitStrategy,
        poll_interval: Duration,
        deadline: Option<Instant>,
    ) {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        match strategy {
            WaitStrategy::Poll => {
                let nap = remaining.map_or(poll_interval, |r| r.min(poll_interval));
                std::thread::sleep(nap);
            }
            WaitStrategy::Notify => {
                let nap = remaining.map_or(NOTIFY_RECHECK, |r| r.min(NOTIFY_RECHECK));
                futex_wait(&self.signal, ticket, Some(nap));
            }
        }
    }

    /// Drop the region and every payload still resident.
    ///
    /// Returns false when the store was already released.
    pub fn release(&self) -> bool {
        let released = self.inner.lock().take();
        let Some(boxes) = released else {
            return false;
        };

        let abandoned = boxes.payloads.iter().filter(|p| p.is_some()).count();
        if abandoned > 0 {
            log::warn!(
                "releasing mailbox region {} with {} undelivered message(s)",
                boxes.shm.name(),
                abandoned
            );
        }
        drop(boxes);

        // Anyone still parked must observe the release
        self.notify();
        true
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Destination ranks whose slot currently holds a message.
    pub fn occupied_slots(&self) -> Result<Vec<usize>> {
        let guard = self.lock()?;
        Ok((0..self.ranks)
            .filter(|&dest| matcher::is_occupied(guard.slot(dest), dest))
            .collect())
    }

    pub fn stats(&self) -> Result<MailboxStats> {
        Ok(self.lock()?.stats())
    }
}

/// Proof that the global lock is held; every slot access goes through it.
pub struct MailboxGuard<'a> {
    guard: MutexGuard<'a, Option<Mailboxes>>,
    ticket: u32,
}

impl<'a> MailboxGuard<'a> {
    #[inline]
    fn boxes(&self) -> &Mailboxes {
        // Checked non-empty when the guard was created
        match self.guard.as_ref() {
            Some(boxes) => boxes,
            None => unreachable!("mailbox guard over released store"),
        }
    }

    #[inline]
    fn boxes_mut(&mut self) -> &mut Mailboxes {
        match self.guard.as_mut() {
            Some(boxes) => boxes,
            None => unreachable!("mailbox guard over released store"),
        }
    }

    /// Wake-up counter value observed when the lock was taken.
    pub fn ticket(&self) -> u32 {
        self.ticket
    }

    /// Slot metadata for `dest`. Panics if `dest` is out of range.
    pub fn slot(&self, dest: usize) -> &SlotHeader {
        let boxes = self.boxes();
        assert!(dest < boxes.payloads.len(), "slot {} out of range", dest);
        unsafe { &*boxes.slots.add(dest) }
    }

    /// Evaluate the matching engine against `me`'s own slot.
    pub fn matches(&self, me: usize, source: Source, tag: TagFilter) -> bool {
        matcher::matches(self.slot(me), me, source, tag)
    }

    /// Envelope of the message resident in `dest`'s slot, if any.
    pub fn peek(&self, dest: usize) -> Option<Status> {
        let slot = self.slot(dest);
        if !matcher::is_occupied(slot, dest) {
            return None;
        }
        Some(Status {
            source: slot.source as usize,
            tag: slot.tag,
            len: slot.length as usize,
        })
    }

    /// Copy `payload` into a fresh buffer owned by `dest`'s slot.
    ///
    /// The caller must have checked that the slot is empty.
    pub fn install(&mut self, dest: usize, source: usize, tag: Tag, payload: &[u8]) {
        debug_assert!(self.slot(dest).is_empty(), "install over occupied slot {}", dest);
        let buffer: Box<[u8]> = payload.into();
        let boxes = self.boxes_mut();
        unsafe {
            std::ptr::write(
                boxes.slots.add(dest),
                SlotHeader {
                    source: source as i32,
                    dest: dest as i32,
                    tag,
                    reserved: 0,
                    length: payload.len() as u64,
                },
            );
            (*boxes.header).installs += 1;
        }
        boxes.payloads[dest] = Some(buffer);
        log::trace!(
            "installed {} byte(s) from rank {} for rank {} tag {}",
            payload.len(),
            source,
            dest,
            tag
        );
    }

    /// Remove the message resident in `dest`'s slot and hand over its payload.
    pub fn take(&mut self, dest: usize) -> Option<(Status, Box<[u8]>)> {
        let status = self.peek(dest)?;
        let boxes = self.boxes_mut();
        let payload = boxes.payloads[dest].take().unwrap_or_default();
        unsafe {
            std::ptr::write(boxes.slots.add(dest), SlotHeader::EMPTY);
            (*boxes.header).removals += 1;
        }
        log::trace!(
            "removed {} byte(s) from rank {} at rank {} tag {}",
            status.len,
            status.source,
            dest,
            status.tag
        );
        Some((status, payload))
    }

    pub fn stats(&self) -> MailboxStats {
        let boxes = self.boxes();
        let header = unsafe { &*boxes.header };
        MailboxStats {
            installs: header.installs,
            removals: header.removals,
            resident: boxes.payloads.iter().filter(|p| p.is_some()).count(),
        }
    }

    pub(crate) fn header(&self) -> &MailboxHeader {
        unsafe { &*self.boxes().header }
    }
}
