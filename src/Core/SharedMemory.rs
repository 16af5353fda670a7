// Shared memory backend abstraction for Linux
// Backs the mailbox table with a /dev/shm file mapped MAP_SHARED

use std::fmt::Debug;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

/// Alignment applied to every mapped region (two cache lines).
pub const REGION_ALIGN: usize = 128;

/// Shared memory backend trait for the mailbox region
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;

    /// Name the region was created under
    fn name(&self) -> &str;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
}

static REGION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Build a region name that is unique within this host for the lifetime of the process.
///
/// Several worlds may live in one process (tests do this all the time), so the
/// pid alone is not enough.
pub fn unique_region_name(prefix: &str) -> String {
    let seq = REGION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}.{}.{}", prefix, std::process::id(), seq)
}

/// Create a new zeroed shared memory region with the specified size
///
/// # Arguments
/// * `size` - Size of the shared memory region in bytes
/// * `name` - Name of the backing file under /dev/shm
///
/// # Returns
/// A boxed trait object implementing SharedMemoryBackend
#[cfg(target_os = "linux")]
pub fn create_shared_memory(size: usize, name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_size: usize, _name: &str) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
pub use linux::LinuxSharedMemory;

#[cfg(target_os = "linux")]
mod linux {
    use super::{RawHandle, SharedMemoryBackend, REGION_ALIGN};
    use std::fs::OpenOptions;
    use std::io;
    use std::os::fd::{AsRawFd, IntoRawFd};
    use std::os::unix::fs::OpenOptionsExt;
    use std::ptr::{self, NonNull};

    #[derive(Debug)]
    pub struct LinuxSharedMemory {
        ptr: NonNull<u8>,
        size: usize,
        fd: i32,
        name: String,
        path: String,
        mapping: (*mut u8, usize),
    }

    unsafe impl Send for LinuxSharedMemory {}
    unsafe impl Sync for LinuxSharedMemory {}

    impl LinuxSharedMemory {
        /// Create a new shared memory region using /dev/shm
        pub fn create(size: usize, name: &str) -> io::Result<Self> {
            if size == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "shared memory region must not be empty",
                ));
            }
            let path = format!("/dev/shm/{}", name);

            // The name is unique per process, so an existing file is a stale leftover
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .map_err(|e| {
                    io::Error::new(
                        e.kind(),
                        format!("Failed to create shared memory file at {}: {}", path, e),
                    )
                })?;

            // Extra space so the aligned view still covers `size` bytes
            let total_size = size + REGION_ALIGN - 1;
            if unsafe { libc::ftruncate(file.as_raw_fd(), total_size as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                let _ = std::fs::remove_file(&path);
                return Err(err);
            }

            // Keep the file descriptor alive
            let fd = file.into_raw_fd();

            let raw = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    total_size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                )
            };
            if raw == libc::MAP_FAILED {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                let _ = std::fs::remove_file(&path);
                return Err(err);
            }

            // Align the pointer to 128 bytes
            let aligned = ((raw as usize + REGION_ALIGN - 1) & !(REGION_ALIGN - 1)) as *mut u8;
            let ptr = match NonNull::new(aligned) {
                Some(ptr) => ptr,
                None => {
                    unsafe {
                        libc::munmap(raw, total_size);
                        libc::close(fd);
                    }
                    let _ = std::fs::remove_file(&path);
                    return Err(io::Error::new(io::ErrorKind::Other, "mmap returned null"));
                }
            };

            log::debug!("mapped shared region {} ({} bytes) at {:p}", path, size, ptr);

            Ok(Self {
                ptr,
                size,
                fd,
                name: name.to_owned(),
                path,
                mapping: (raw as *mut u8, total_size),
            })
        }
    }

    impl Drop for LinuxSharedMemory {
        fn drop(&mut self) {
            unsafe {
                let (raw, len) = self.mapping;
                libc::munmap(raw as *mut libc::c_void, len);
                libc::close(self.fd);
            }
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("failed to unlink shared region {}: {}", self.path, e);
            }
            log::debug!("released shared region {}", self.path);
        }
    }

    impl SharedMemoryBackend for LinuxSharedMemory {
        fn as_ptr(&self) -> *mut u8 {
            self.ptr.as_ptr()
        }

        fn size(&self) -> usize {
            self.size
        }

        fn raw_handle(&self) -> RawHandle {
            RawHandle::Fd(self.fd)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}
