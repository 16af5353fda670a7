use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Sleep while `atomic` still holds `expected`, for at most `timeout`.
///
/// Spurious returns are allowed; callers re-check their own predicate.
#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Acquire) != expected {
        return;
    }

    let ts = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = match ts.as_ref() {
        Some(ts) => ts as *const libc::timespec,
        None => ptr::null::<libc::timespec>(),
    };

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake every thread parked on `atomic`.
#[cfg(target_os = "linux")]
pub fn futex_wake_all(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32, _timeout: Option<Duration>) {
    // Fallback for non-Linux: busy wait with yield
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake_all(_atomic: &AtomicU32) {
    // No-op on non-Linux
}
