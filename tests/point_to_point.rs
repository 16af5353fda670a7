// Send / receive / probe behaviour across rank threads.
// Run with: cargo test --test point_to_point -- --nocapture

use shmem_mpi::{Error, ErrorKind, Source, TagFilter, WaitStrategy, World, ANY_SOURCE, ANY_TAG};
use std::time::Duration;

fn world(ranks: usize) -> World {
    let _ = env_logger::builder().is_test(true).try_init();
    World::builder()
        .with_ranks(ranks)
        .with_timeout(Some(Duration::from_secs(20)))
        .with_region_name("p2p_test")
        .build()
        .unwrap()
}

#[test]
fn test_wildcard_source_receive() {
    let results = world(4)
        .launch(|comm| {
            match comm.rank() {
                2 => comm.send(&[0x01, 0x02, 0x03], 1, 7)?,
                1 => {
                    let (payload, status) = comm.recv(ANY_SOURCE, 7)?;
                    assert_eq!(status.source, 2);
                    assert_eq!(status.tag, 7);
                    assert_eq!(status.len, 3);
                    assert_eq!(payload, vec![0x01, 0x02, 0x03]);
                }
                _ => {}
            }
            Ok::<_, Error>(())
        })
        .unwrap();

    for result in results {
        result.unwrap();
    }
}

#[test]
fn test_payload_round_trip_both_strategies() {
    for strategy in [WaitStrategy::Poll, WaitStrategy::Notify] {
        let world = World::builder()
            .with_ranks(2)
            .with_wait_strategy(strategy)
            .with_timeout(Some(Duration::from_secs(20)))
            .build()
            .unwrap();

        let results = world
            .launch(|comm| {
                let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
                if comm.rank() == 0 {
                    for round in 0..50 {
                        comm.send(&payload, 1, round)?;
                    }
                } else {
                    for round in 0..50 {
                        let (got, status) = comm.recv(0usize, round)?;
                        assert_eq!(status.len, payload.len());
                        assert_eq!(got, payload);
                    }
                }
                Ok::<_, Error>(())
            })
            .unwrap();
        for result in results {
            result.unwrap();
        }
    }
}

#[test]
fn test_probe_does_not_consume() {
    let results = world(2)
        .launch(|comm| {
            if comm.rank() == 0 {
                comm.send(b"hello", 1, 3)?;
            } else {
                // Wait until it lands without taking it
                let status = loop {
                    if let Some(status) = comm.probe(ANY_SOURCE, ANY_TAG)? {
                        break status;
                    }
                    std::thread::yield_now();
                };
                assert_eq!(status.source, 0);
                assert_eq!(status.tag, 3);
                assert_eq!(status.len, 5);

                // Still there on a second look
                assert_eq!(comm.probe(0usize, 3)?, Some(status));
                // A filter that does not fit reports nothing
                assert_eq!(comm.probe(0usize, 4)?, None);

                let (payload, again) = comm.recv(0usize, 3)?;
                assert_eq!(again, status);
                assert_eq!(payload, b"hello");
                assert_eq!(comm.probe(ANY_SOURCE, ANY_TAG)?, None);
            }
            Ok::<_, Error>(())
        })
        .unwrap();
    for result in results {
        result.unwrap();
    }
}

#[test]
fn test_invalid_rank_rejected() {
    let results = world(3)
        .launch(|comm| {
            let err = comm.send(b"x", 3, 0).unwrap_err();
            assert!(matches!(err, Error::InvalidRank { rank: 3, size: 3 }));
            assert_eq!(err.kind(), ErrorKind::Argument);

            let err = comm.recv(Source::Rank(7), ANY_TAG).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Argument);

            let err = comm.probe(Source::Rank(99), ANY_TAG).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Argument);

            let err = comm.send(b"x", 0, -1).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Argument);

            // Nothing was installed by the failed calls
            assert!(comm.world().store().occupied_slots().unwrap().is_empty());
        })
        .unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn test_recv_into_too_small_keeps_message() {
    let results = world(2)
        .launch(|comm| {
            if comm.rank() == 0 {
                comm.send(&[9u8; 16], 1, 0)?;
            } else {
                let mut small = [0u8; 4];
                let err = comm.recv_into(&mut small, 0usize, 0).unwrap_err();
                assert!(matches!(err, Error::BufferTooSmall { needed: 16, available: 4 }));
                assert_eq!(err.kind(), ErrorKind::Buffer);

                let mut big = [0u8; 32];
                let status = comm.recv_into(&mut big, 0usize, 0)?;
                assert_eq!(status.len, 16);
                assert_eq!(&big[..16], &[9u8; 16]);
                assert_eq!(&big[16..], &[0u8; 16]);
            }
            Ok::<_, Error>(())
        })
        .unwrap();
    for result in results {
        result.unwrap();
    }
}

#[test]
fn test_recv_timeout() {
    let results = world(2)
        .launch(|comm| {
            if comm.rank() == 1 {
                let err = comm
                    .recv_timeout(0usize, 5, Duration::from_millis(50))
                    .unwrap_err();
                assert!(matches!(err, Error::Timeout { op: "recv", .. }));
                assert_eq!(err.kind(), ErrorKind::Timeout);
            }
        })
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_send_blocks_on_occupied_slot() {
    let results = world(2)
        .launch(|comm| {
            if comm.rank() == 0 {
                comm.send(b"first", 1, 1)?;
                // Rank 1 has not received yet, so the slot stays occupied
                let err = comm
                    .send_timeout(b"second", 1, 2, Duration::from_millis(50))
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Timeout);
                comm.barrier()?;
                comm.barrier()?;
                // Slot drained, the retry goes through
                comm.send(b"second", 1, 2)?;
            } else {
                comm.barrier()?;
                let (first, _) = comm.recv(0usize, 1)?;
                assert_eq!(first, b"first");
                comm.barrier()?;
                let (second, _) = comm.recv(0usize, 2)?;
                assert_eq!(second, b"second");
            }
            Ok::<_, Error>(())
        })
        .unwrap();
    for result in results {
        result.unwrap();
    }
}

#[test]
fn test_tag_filtered_receive_waits_for_its_tag() {
    let results = world(2)
        .launch(|comm| {
            if comm.rank() == 0 {
                comm.send(b"a", 1, 10)?;
                comm.send(b"b", 1, 11)?;
            } else {
                // Taking tag 10 first frees the slot for tag 11
                let (a, sa) = comm.recv(0usize, TagFilter::Tag(10))?;
                let (b, sb) = comm.recv(0usize, TagFilter::Tag(11))?;
                assert_eq!((a.as_slice(), sa.tag), (&b"a"[..], 10));
                assert_eq!((b.as_slice(), sb.tag), (&b"b"[..], 11));
            }
            Ok::<_, Error>(())
        })
        .unwrap();
    for result in results {
        result.unwrap();
    }
}

#[test]
fn test_self_send() {
    let results = world(1)
        .launch(|comm| {
            comm.send(b"me", 0, 0)?;
            let (payload, status) = comm.recv(0usize, 0)?;
            assert_eq!(payload, b"me");
            assert_eq!(status.source, 0);
            Ok::<_, Error>(())
        })
        .unwrap();
    results.into_iter().for_each(|r| r.unwrap());
}

#[test]
fn test_zero_length_message() {
    let results = world(2)
        .launch(|comm| {
            if comm.rank() == 0 {
                comm.send(&[], 1, 0)?;
            } else {
                let (payload, status) = comm.recv(ANY_SOURCE, ANY_TAG)?;
                assert!(payload.is_empty());
                assert_eq!(status.len, 0);
            }
            Ok::<_, Error>(())
        })
        .unwrap();
    results.into_iter().for_each(|r| r.unwrap());
}
