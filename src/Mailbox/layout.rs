use std::mem::size_of;

/// Identifies a mapped region as a mailbox table ("SHMPIMBX").
pub const MAGIC_NUMBER: u64 = 0x5348_4D50_494D_4258;

/// The version of the memory layout.
pub const LAYOUT_VERSION: u32 = 1;

/// `dest` value of a slot that holds no message.
pub const EMPTY_DEST: i32 = -1;

/// The global header located at the very beginning of the mailbox region.
///
/// Only ever read or written while the store lock is held.
#[repr(C, align(128))]
pub struct MailboxHeader {
    /// A "magic number" to identify the memory region as a mailbox table.
    pub magic: u64,

    /// The version of the memory layout.
    pub version: u32,

    /// Number of slots that follow the header, one per rank.
    pub rank_count: u32,

    /// Byte offset from the start of the region to slot 0.
    pub slot_offset: u64,

    /// Messages installed since the region was created.
    pub installs: u64,

    /// Messages removed since the region was created.
    pub removals: u64,
}

/// Metadata of the message resident in one destination's mailbox.
///
/// The payload itself is not stored in the region; the store keeps it in a
/// separately allocated buffer indexed by the same destination rank.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    /// Sending rank.
    pub source: i32,

    /// Receiving rank, or [`EMPTY_DEST`].
    pub dest: i32,

    /// Message tag.
    pub tag: i32,

    /// Reserved/padding.
    pub reserved: u32,

    /// Payload length in bytes.
    pub length: u64,
}

impl SlotHeader {
    pub const EMPTY: SlotHeader = SlotHeader {
        source: -1,
        dest: EMPTY_DEST,
        tag: -1,
        reserved: 0,
        length: 0,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dest == EMPTY_DEST
    }
}

/// Offset of slot 0 from the start of the region.
#[inline]
pub const fn slot_offset() -> usize {
    size_of::<MailboxHeader>()
}

/// Bytes needed for a table of `ranks` slots.
#[inline]
pub const fn region_size(ranks: usize) -> usize {
    slot_offset() + ranks * size_of::<SlotHeader>()
}
