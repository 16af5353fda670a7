// Module naming follows project convention (Comm = communicator layer, Core = OS plumbing)
#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Mailbox;

#[allow(non_snake_case)]
pub mod Comm;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod error;
pub mod info;
pub mod io;

pub use error::{Error, ErrorKind, Result};
pub use info::Info;
pub use io::{AccessMode, File, Whence};
pub use Comm::{wtime, Communicator, Datatype, Op, Request, WaitStrategy, World, WorldBuilder, WorldConfig}; // re-export for stable path
pub use Mailbox::{Source, Status, Tag, TagFilter, ANY_SOURCE, ANY_TAG};
