// Barrier and broadcast composed from the point-to-point primitives

use super::communicator::Communicator;
use crate::error::{Error, Result};
use crate::Mailbox::Structs::{Source, Tag, TagFilter};
use std::time::Duration;

impl Communicator {
    /// Block until every rank has reached the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.check_active()?;
        self.world().barrier_wait("barrier", self.world().config().timeout)
    }

    pub fn barrier_timeout(&self, timeout: Duration) -> Result<()> {
        self.check_active()?;
        self.world().barrier_wait("barrier", Some(timeout))
    }

    /// Deliver `root`'s `buf` into `buf` on every rank, root included.
    ///
    /// The root sends one message per rank, tagged with the receiving rank,
    /// then every rank receives the message tagged with its own rank.
    pub fn broadcast(&self, buf: &mut [u8], root: usize) -> Result<()> {
        self.check_active()?;
        self.check_rank(root)?;

        if self.rank() == root {
            for dest in 0..self.size() {
                self.send(buf, dest, dest as Tag).map_err(|e| {
                    log::debug!("broadcast from {} stopped at rank {}: {}", root, dest, e);
                    Error::Broadcast {
                        dest,
                        source: Box::new(e),
                    }
                })?;
            }
        }

        self.recv_into(buf, Source::Rank(root), TagFilter::Tag(self.rank() as Tag))?;
        Ok(())
    }
}
