use super::layout::SlotHeader;
use super::Structs::{Source, TagFilter};

/// Decide whether the message held in `slot` is the one `me` is asking for.
///
/// An empty slot never matches. The slot's destination must be `me`, its
/// source must equal the requested rank unless `source` is the wildcard, and
/// its tag must equal the requested tag unless `tag` is the wildcard.
pub fn matches(slot: &SlotHeader, me: usize, source: Source, tag: TagFilter) -> bool {
    if slot.is_empty() || !same_rank(slot.dest, me) {
        return false;
    }

    if let Source::Rank(rank) = source {
        if !same_rank(slot.source, rank) {
            return false;
        }
    }

    match tag {
        TagFilter::Any => true,
        TagFilter::Tag(t) => slot.tag == t,
    }
}

/// True when `slot` holds any message for `dest`.
#[inline]
pub fn is_occupied(slot: &SlotHeader, dest: usize) -> bool {
    matches(slot, dest, Source::Any, TagFilter::Any)
}

#[inline]
fn same_rank(stored: i32, rank: usize) -> bool {
    stored >= 0 && stored as usize == rank
}
