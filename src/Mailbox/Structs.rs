// Query and result types shared by the point-to-point and collective layers

/// Message tag. Concrete tags are non-negative.
pub type Tag = i32;

/// Which sender a receive or probe accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Wildcard: any sender matches.
    Any,
    Rank(usize),
}

/// Which tag a receive or probe accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilter {
    /// Wildcard: any tag matches.
    Any,
    Tag(Tag),
}

pub const ANY_SOURCE: Source = Source::Any;
pub const ANY_TAG: TagFilter = TagFilter::Any;

impl From<usize> for Source {
    fn from(rank: usize) -> Self {
        Source::Rank(rank)
    }
}

impl From<Tag> for TagFilter {
    fn from(tag: Tag) -> Self {
        TagFilter::Tag(tag)
    }
}

/// Envelope of a matched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub source: usize,
    pub tag: Tag,
    /// Payload length in bytes.
    pub len: usize,
}

/// Running totals kept in the region header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub installs: u64,
    pub removals: u64,
    pub resident: usize,
}
