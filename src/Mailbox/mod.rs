mod debug;
pub mod layout;
pub mod matcher;
pub mod store;
pub mod Structs;

pub use matcher::matches;
pub use store::{MailboxGuard, MailboxStore};
pub use Structs::{MailboxStats, Source, Status, Tag, TagFilter, ANY_SOURCE, ANY_TAG}; // re-export for stable path
