// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use shmem_mpi::Core::{create_shared_memory, unique_region_name, RawHandle};
    use std::path::Path;

    #[test]
    fn test_create_shared_memory() {
        let size = 4096;
        let name = unique_region_name("test_create");
        let shm = create_shared_memory(size, &name).unwrap();

        assert_eq!(shm.size(), size);
        assert_eq!(shm.name(), name);
        assert!(!shm.as_ptr().is_null());
        assert_eq!(shm.as_ptr() as usize % 128, 0, "region must be 128-byte aligned");

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
    }

    #[test]
    fn test_shared_memory_size() {
        let sizes = vec![1024, 4096, 65536, 1024 * 1024];

        for size in sizes {
            let shm = create_shared_memory(size, &unique_region_name("test_size")).unwrap();
            assert_eq!(shm.size(), size);
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = create_shared_memory(0, &unique_region_name("test_zero_size")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_raw_handle() {
        let shm = create_shared_memory(4096, &unique_region_name("test_handle")).unwrap();

        match shm.raw_handle() {
            RawHandle::Fd(fd) => {
                assert!(fd > 0, "File descriptor should be positive");
            }
        }
    }

    #[test]
    fn test_mmap_zero_initialized() {
        let size = 1024;
        let shm = create_shared_memory(size, &unique_region_name("test_zero")).unwrap();

        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), size);
            assert!(slice.iter().all(|&b| b == 0), "Mmap'd memory should be zero-initialized");
        }
    }

    #[test]
    fn test_backing_file_unlinked_on_drop() {
        let name = unique_region_name("test_unlink");
        let path = format!("/dev/shm/{}", name);

        let shm = create_shared_memory(4096, &name).unwrap();
        assert!(Path::new(&path).exists());

        drop(shm);
        assert!(!Path::new(&path).exists(), "{} should be removed on drop", path);
    }

    #[test]
    fn test_unique_region_names() {
        let a = unique_region_name("dup");
        let b = unique_region_name("dup");
        assert_ne!(a, b);
        assert!(a.starts_with("dup."));
        assert!(a.contains(&std::process::id().to_string()));
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use shmem_mpi::Core::create_shared_memory;

    #[test]
    fn test_unsupported_platform() {
        let result = create_shared_memory(4096, "test");
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }
}
