use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT_POLL: Duration = Duration::from_micros(100);

#[derive(Debug, Default)]
struct RequestState {
    done: AtomicBool,
    bytes: AtomicUsize,
}

/// Completion token for a non-blocking operation. Waiters poll `done`.
///
/// Operations in this crate finish before returning their request, so the
/// token is normally already complete.
#[derive(Debug, Clone, Default)]
pub struct Request {
    state: Arc<RequestState>,
}

impl Request {
    /// A request whose operation has not finished yet.
    pub fn pending() -> Self {
        Self::default()
    }

    /// A request that already finished after moving `bytes` bytes.
    pub fn completed(bytes: usize) -> Self {
        let request = Self::pending();
        request.complete(bytes);
        request
    }

    /// Mark the operation finished.
    pub fn complete(&self, bytes: usize) {
        self.state.bytes.store(bytes, Ordering::Relaxed);
        self.state.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.state.done.load(Ordering::Acquire)
    }

    /// Bytes transferred, if the operation has finished.
    pub fn test(&self) -> Option<usize> {
        if self.is_done() {
            Some(self.state.bytes.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Poll until the operation finishes; returns the bytes transferred.
    pub fn wait(&self) -> usize {
        loop {
            if let Some(bytes) = self.test() {
                return bytes;
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(bytes) = self.test() {
                return Ok(bytes);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    op: "request wait",
                    after: timeout,
                });
            }
            std::thread::sleep(WAIT_POLL.min(deadline - now));
        }
    }
}
