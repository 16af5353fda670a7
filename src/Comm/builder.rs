use super::World;
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use std::str::FromStr;
use std::time::Duration;

/// How a blocked send, receive or probe loop waits between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Release the lock and sleep for the poll interval.
    Poll,
    /// Release the lock and park until some slot changes.
    Notify,
}

impl FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(WaitStrategy::Poll),
            "notify" => Ok(WaitStrategy::Notify),
            other => Err(format!("unknown wait strategy {:?}", other)),
        }
    }
}

pub const ENV_RANKS: &str = "SHMEM_MPI_RANKS";
pub const ENV_POLL_US: &str = "SHMEM_MPI_POLL_US";
pub const ENV_TIMEOUT_MS: &str = "SHMEM_MPI_TIMEOUT_MS";
pub const ENV_WAIT: &str = "SHMEM_MPI_WAIT";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(10);
const DEFAULT_REGION_PREFIX: &str = "shmem_mpi";

/// Defaults taken from the environment, read once per process.
#[derive(Debug, Default)]
struct EnvDefaults {
    ranks: Option<usize>,
    poll_interval: Option<Duration>,
    timeout: Option<Duration>,
    wait_strategy: Option<WaitStrategy>,
}

lazy_static! {
    static ref ENV_DEFAULTS: EnvDefaults = EnvDefaults::from_env();
}

impl EnvDefaults {
    fn from_env() -> Self {
        Self {
            ranks: parse_env::<usize>(ENV_RANKS).filter(|&n| n > 0),
            poll_interval: parse_env::<u64>(ENV_POLL_US)
                .filter(|&us| us > 0)
                .map(Duration::from_micros),
            timeout: parse_env::<u64>(ENV_TIMEOUT_MS).map(Duration::from_millis),
            wait_strategy: parse_env::<WaitStrategy>(ENV_WAIT),
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

/// Settings a world is built with. Immutable once the world exists.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub ranks: usize,
    pub wait_strategy: WaitStrategy,
    pub poll_interval: Duration,
    /// Default bound for blocking operations; `None` blocks forever.
    pub timeout: Option<Duration>,
    pub region_prefix: String,
}

pub struct WorldBuilder {
    config: WorldConfig,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        let env = &*ENV_DEFAULTS;
        let ranks = env.ranks.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        Self {
            config: WorldConfig {
                ranks,
                wait_strategy: env.wait_strategy.unwrap_or(WaitStrategy::Notify),
                poll_interval: env.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
                timeout: env.timeout,
                region_prefix: DEFAULT_REGION_PREFIX.to_string(),
            },
        }
    }
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ranks(mut self, ranks: usize) -> Self {
        self.config.ranks = ranks;
        self
    }

    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.config.wait_strategy = strategy;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Prefix of the /dev/shm file backing the mailbox table.
    pub fn with_region_name(mut self, prefix: &str) -> Self {
        self.config.region_prefix = prefix.to_string();
        self
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Validate the settings and allocate the mailbox store.
    pub fn build(self) -> Result<World> {
        let config = self.config;
        if config.ranks == 0 {
            return Err(Error::InvalidArgument("a world needs at least one rank".into()));
        }
        if config.poll_interval.is_zero() {
            return Err(Error::InvalidArgument("poll interval must be non-zero".into()));
        }
        if config.region_prefix.is_empty() || config.region_prefix.contains('/') {
            return Err(Error::InvalidArgument(format!(
                "invalid region name {:?}",
                config.region_prefix
            )));
        }
        World::new(config)
    }
}
