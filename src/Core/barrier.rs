use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// How a [`RankBarrier::wait`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    Tripped,
    TimedOut,
    /// The group was torn down before everyone arrived.
    Aborted,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// Reusable rendezvous point for a fixed number of participants.
///
/// Unlike `std::sync::Barrier` a waiter can give up at a deadline; it then
/// withdraws its arrival so the barrier stays usable for the others.
pub struct RankBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl RankBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            cvar: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Block until every participant has arrived, or until `deadline` passes.
    pub fn wait(&self, deadline: Option<Instant>) -> BarrierOutcome {
        let mut state = self.state.lock();
        if state.aborted {
            return BarrierOutcome::Aborted;
        }
        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return BarrierOutcome::Tripped;
        }

        while state.generation == generation {
            if state.aborted {
                return BarrierOutcome::Aborted;
            }
            match deadline {
                Some(deadline) => {
                    if self.cvar.wait_until(&mut state, deadline).timed_out()
                        && state.generation == generation
                        && !state.aborted
                    {
                        state.arrived -= 1;
                        return BarrierOutcome::TimedOut;
                    }
                }
                None => self.cvar.wait(&mut state),
            }
        }
        BarrierOutcome::Tripped
    }

    /// Release every current and future waiter with [`BarrierOutcome::Aborted`].
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.aborted = true;
        self.cvar.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}
