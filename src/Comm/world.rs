use super::builder::{WorldBuilder, WorldConfig};
use super::communicator::Communicator;
use crate::error::{Error, Result};
use crate::Core::barrier::{BarrierOutcome, RankBarrier};
use crate::Core::SharedMemory::unique_region_name;
use crate::Mailbox::store::MailboxStore;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) struct WorldShared {
    pub(crate) config: WorldConfig,
    pub(crate) store: MailboxStore,
    pub(crate) barrier: RankBarrier,
    /// Contribution table used by reduce and all-gather.
    pub(crate) exchange: Mutex<Vec<Option<Vec<u8>>>>,
    claimed: Vec<AtomicBool>,
}

/// Coordinator owning the mailbox store, the barrier and the configuration.
///
/// Cheap to clone; every clone refers to the same set of ranks.
#[derive(Clone)]
pub struct World {
    pub(crate) shared: Arc<WorldShared>,
}

impl World {
    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    pub(crate) fn new(config: WorldConfig) -> Result<Self> {
        let region = unique_region_name(&config.region_prefix);
        let store = MailboxStore::new(config.ranks, &region)?;
        log::debug!(
            "world of {} rank(s) up ({:?} wait, poll {:?}, timeout {:?})",
            config.ranks,
            config.wait_strategy,
            config.poll_interval,
            config.timeout
        );
        Ok(Self {
            shared: Arc::new(WorldShared {
                barrier: RankBarrier::new(config.ranks),
                exchange: Mutex::new((0..config.ranks).map(|_| None).collect()),
                claimed: (0..config.ranks).map(|_| AtomicBool::new(false)).collect(),
                store,
                config,
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.shared.config.ranks
    }

    pub fn config(&self) -> &WorldConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &MailboxStore {
        &self.shared.store
    }

    /// True once rank 0 has released the mailbox region.
    pub fn is_finalized(&self) -> bool {
        self.shared.store.is_released()
    }

    /// Hand out the context for `rank`. Each rank can be claimed once.
    ///
    /// The caller must run `init()` on it before messaging and `finalize()`
    /// when done; [`World::launch`] does both.
    pub fn communicator(&self, rank: usize) -> Result<Communicator> {
        let size = self.size();
        if rank >= size {
            return Err(Error::InvalidRank { rank, size });
        }
        if self.shared.claimed[rank].swap(true, Ordering::AcqRel) {
            return Err(Error::InvalidArgument(format!(
                "rank {} already has a communicator",
                rank
            )));
        }
        Ok(Communicator::new(rank, self.clone()))
    }

    /// Run `f` once per rank, each on its own thread, and collect the results in rank order.
    ///
    /// Every thread performs the initialization barrier before `f` and the
    /// collective finalize after it, also when `f` panicked.
    pub fn launch<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(&mut Communicator) -> R + Sync,
        R: Send,
    {
        let mut comms = Vec::with_capacity(self.size());
        for rank in 0..self.size() {
            comms.push(self.communicator(rank)?);
        }

        let f = &f;
        let (joined, spawn_error) = crossbeam_utils::thread::scope(|s| {
            let mut handles = Vec::with_capacity(comms.len());
            let mut spawn_error = None;
            for mut comm in comms {
                let rank = comm.rank();
                let spawned = s
                    .builder()
                    .name(format!("rank-{}", rank))
                    .spawn(move |_| run_rank(&mut comm, f));
                match spawned {
                    Ok(handle) => handles.push((rank, handle)),
                    Err(e) => {
                        log::error!("failed to start rank {}: {}", rank, e);
                        // Ranks already running are parked in the init barrier
                        self.shared.barrier.abort();
                        spawn_error = Some(e);
                        break;
                    }
                }
            }

            let joined = handles
                .into_iter()
                .map(|(rank, handle)| match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(Error::RankPanicked(rank)),
                })
                .collect::<Vec<_>>();
            (joined, spawn_error)
        })
        .map_err(|_| Error::Resource("rank scope panicked".into()))?;

        if let Some(e) = spawn_error {
            return Err(Error::Resource(format!("failed to start rank thread: {}", e)));
        }
        joined.into_iter().collect()
    }

    /// Wait at the world barrier, honouring `timeout`.
    pub(crate) fn barrier_wait(&self, op: &'static str, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        match self.shared.barrier.wait(deadline) {
            BarrierOutcome::Tripped => Ok(()),
            BarrierOutcome::Aborted => Err(Error::GroupAborted),
            BarrierOutcome::TimedOut => {
                let after = timeout.unwrap_or_default();
                log::warn!("{} gave up after {:?}", op, after);
                Err(Error::Timeout { op, after })
            }
        }
    }
}

fn run_rank<F, R>(comm: &mut Communicator, f: &F) -> Result<R>
where
    F: Fn(&mut Communicator) -> R,
{
    let rank = comm.rank();
    comm.init()?;
    let outcome = catch_unwind(AssertUnwindSafe(|| f(comm)));
    if outcome.is_err() {
        log::error!("rank {} panicked; joining finalize so the others can finish", rank);
    }
    comm.finalize()?;
    outcome.map_err(|_| Error::RankPanicked(rank))
}
