pub mod barrier;
pub mod futex;
pub mod SharedMemory;

pub use barrier::{BarrierOutcome, RankBarrier};
pub use SharedMemory::{create_shared_memory, unique_region_name, RawHandle, SharedMemoryBackend};
