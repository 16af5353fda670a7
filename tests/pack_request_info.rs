// Pack/unpack, request tokens and info objects.

use shmem_mpi::info::{MAX_INFO_KEY, MAX_INFO_VAL};
use shmem_mpi::{Comm, Datatype, Error, ErrorKind, Info, Request};
use std::time::Duration;

#[test]
fn test_pack_then_unpack() {
    let ints: Vec<u8> = [1i32, -2, 3].iter().flat_map(|v| v.to_ne_bytes()).collect();
    let doubles: Vec<u8> = [0.25f64].iter().flat_map(|v| v.to_ne_bytes()).collect();

    let mut packed = [0u8; 20];
    let mut position = 0;
    Comm::pack(&ints, 3, Datatype::Int, &mut packed, &mut position).unwrap();
    assert_eq!(position, 12);
    Comm::pack(&doubles, 1, Datatype::Double, &mut packed, &mut position).unwrap();
    assert_eq!(position, 20);

    let mut out_ints = [0u8; 12];
    let mut out_double = [0u8; 8];
    let mut position = 0;
    Comm::unpack(&packed, &mut position, &mut out_ints, 3, Datatype::Int).unwrap();
    Comm::unpack(&packed, &mut position, &mut out_double, 1, Datatype::Double).unwrap();
    assert_eq!(position, 20);
    assert_eq!(&out_ints[..], &ints[..]);
    assert_eq!(f64::from_ne_bytes(out_double), 0.25);
}

#[test]
fn test_pack_errors() {
    let mut out = [0u8; 4];
    let mut position = 0;

    // Claims more elements than the input holds
    let err = Comm::pack(&[0u8; 4], 2, Datatype::Int, &mut out, &mut position).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    // Does not fit behind the current position
    position = 2;
    let err = Comm::pack(&[0u8; 4], 1, Datatype::Int, &mut out, &mut position).unwrap_err();
    assert!(matches!(err, Error::BufferTooSmall { needed: 4, available: 2 }));
    assert_eq!(position, 2, "a failed pack leaves the position alone");

    let mut position = 0;
    let mut dest = [0u8; 2];
    let err = Comm::unpack(&[0u8; 8], &mut position, &mut dest, 1, Datatype::Int).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Buffer);
    let err = Comm::unpack(&[0u8; 2], &mut position, &mut [0u8; 8], 1, Datatype::Int).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Buffer);
}

#[test]
fn test_datatype_sizes() {
    assert_eq!(Datatype::Char.size(), 1);
    assert_eq!(Datatype::Short.size(), 2);
    assert_eq!(Datatype::Int.size(), 4);
    assert_eq!(Datatype::Long.size(), 8);
    assert_eq!(Datatype::Double.size(), 8);
    assert_eq!(Datatype::LongDouble.size(), 16);
    assert!(Datatype::Float.is_reducible());
    assert!(!Datatype::Byte.is_reducible());
}

#[test]
fn test_request_completion() {
    let done = Request::completed(12);
    assert!(done.is_done());
    assert_eq!(done.test(), Some(12));
    assert_eq!(done.wait(), 12);

    let pending = Request::pending();
    assert_eq!(pending.test(), None);
    assert_eq!(
        pending.wait_timeout(Duration::from_millis(10)).unwrap_err().kind(),
        ErrorKind::Timeout
    );

    let completer = pending.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        completer.complete(7);
    });
    assert_eq!(pending.wait(), 7);
    handle.join().unwrap();
}

#[test]
fn test_info_set_get_delete() {
    let mut info = Info::new();
    assert_eq!(info.nkeys(), 0);

    info.set("striping_factor", "4").unwrap();
    info.set("cb_nodes", "2").unwrap();
    info.set("striping_factor", "8").unwrap();
    assert_eq!(info.nkeys(), 2);
    assert_eq!(info.get("striping_factor"), Some("8"));
    assert_eq!(info.get("missing"), None);

    assert_eq!(info.delete("cb_nodes"), Some("2".to_string()));
    assert_eq!(info.delete("cb_nodes"), None);
    assert_eq!(info.nkeys(), 1);
}

#[test]
fn test_info_enumeration_is_stable() {
    let mut info = Info::default();
    // "ab" and "ba" share a bucket under the additive hash
    for key in ["ab", "zz", "ba", "k"] {
        info.set(key, key).unwrap();
    }

    let keys: Vec<String> = (0..info.nkeys())
        .map(|n| info.nth_key(n).unwrap().to_string())
        .collect();
    let iterated: Vec<&str> = info.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, iterated);
    assert_eq!(keys.len(), 4);

    let ab = keys.iter().position(|k| k == "ab").unwrap();
    let ba = keys.iter().position(|k| k == "ba").unwrap();
    assert_eq!(ba, ab + 1, "same bucket keeps insertion order");

    assert_eq!(info.nth_key(4).unwrap_err().kind(), ErrorKind::Argument);
}

#[test]
fn test_info_limits() {
    let mut info = Info::new();
    assert!(info.set("", "v").is_err());
    assert!(info.set(&"k".repeat(MAX_INFO_KEY + 1), "v").is_err());
    assert!(info.set("k", &"v".repeat(MAX_INFO_VAL + 1)).is_err());
    info.set(&"k".repeat(MAX_INFO_KEY), &"v".repeat(MAX_INFO_VAL)).unwrap();
    assert_eq!(info.nkeys(), 1);
}

#[test]
fn test_pack_count_overflow_is_argument_error() {
    let huge = usize::MAX / 2 + 1;
    let mut out = [0u8; 8];
    let mut position = 0;

    let err = Comm::pack(&[1u8; 8], huge, Datatype::Short, &mut out, &mut position).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(position, 0);
    assert_eq!(out, [0u8; 8], "nothing was packed");

    let err = Comm::unpack(&[1u8; 8], &mut position, &mut out, huge, Datatype::Int).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(position, 0);
}

#[test]
fn test_position_past_end_is_argument_error() {
    let mut out = [0u8; 4];
    let mut position = 9;
    let err = Comm::pack(&[], 0, Datatype::Byte, &mut out, &mut position).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    let err = Comm::unpack(&[0u8; 4], &mut position, &mut out, 0, Datatype::Byte).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(position, 9);
}
