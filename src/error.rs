use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::Comm::reduce::Datatype;

/// Coarse classification of an [`Error`].
///
/// Callers that only care about what went wrong, not the exact details, should
/// match on this instead of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Buffer,
    Resource,
    UnsupportedType,
    State,
    Timeout,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid rank {rank} (world size {size})")]
    InvalidRank { rank: usize, size: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("datatype mismatch: send {send:?}, receive {recv:?}")]
    TypeMismatch { send: Datatype, recv: Datatype },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("broadcast fan-out to rank {dest} failed: {source}")]
    Broadcast {
        dest: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("resource allocation failed: {0}")]
    Resource(String),

    #[error("datatype {0:?} is not supported by this operation")]
    UnsupportedType(Datatype),

    #[error("world has been finalized")]
    Finalized,

    #[error("communicator for rank {0} has not been initialized")]
    NotInitialized(usize),

    #[error("rank group aborted before every rank arrived")]
    GroupAborted,

    #[error("rank {0} panicked")]
    RankPanicked(usize),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRank { .. } | Error::InvalidArgument(_) | Error::TypeMismatch { .. } => {
                ErrorKind::Argument
            }
            Error::BufferTooSmall { .. } | Error::Broadcast { .. } => ErrorKind::Buffer,
            Error::Resource(_) | Error::GroupAborted => ErrorKind::Resource,
            Error::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Error::Finalized | Error::NotInitialized(_) | Error::RankPanicked(_) => {
                ErrorKind::State
            }
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
