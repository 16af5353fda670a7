// Two ranks bounce a counter until the round limit or Ctrl+C
use shmem_mpi::{Communicator, World};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const PING: i32 = 1;
const PONG: i32 = 2;

fn main() -> shmem_mpi::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let rounds: u64 = match args.get(1).map(|s| s.parse()) {
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            eprintln!("Usage: {} [rounds]", args[0]);
            std::process::exit(1);
        }
        None => 10_000,
    };

    let keep_alive = Arc::new(AtomicBool::new(true));
    let keep_alive_for_handler = Arc::clone(&keep_alive);

    // Handle Ctrl+C so both ranks finish the round they are in and finalize
    ctrlc::set_handler(move || {
        keep_alive_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let world = World::builder().with_ranks(2).build()?;
    println!("ping_pong: {:?}", world);

    let results = world.launch(|comm| play(comm, rounds, &keep_alive))?;
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(count) => println!("rank {} handled {} message(s)", rank, count),
            Err(e) => eprintln!("rank {} failed: {}", rank, e),
        }
    }
    Ok(())
}

/// Rank 0 sends `[continue, counter]`, rank 1 answers with the counter plus one.
fn play(comm: &mut Communicator, rounds: u64, keep_alive: &AtomicBool) -> shmem_mpi::Result<u64> {
    let start = comm.wtime();
    let mut handled = 0u64;

    if comm.rank() == 0 {
        let mut counter = 0u64;
        loop {
            let more = handled < rounds && keep_alive.load(Ordering::SeqCst);
            let mut ping = [0u8; 9];
            ping[0] = more as u8;
            ping[1..].copy_from_slice(&counter.to_le_bytes());
            comm.send(&ping, 1, PING)?;
            if !more {
                break;
            }

            let mut pong = [0u8; 8];
            comm.recv_into(&mut pong, 1usize, PONG)?;
            counter = u64::from_le_bytes(pong);
            handled += 1;
        }
        let elapsed = comm.wtime() - start;
        println!(
            "rank 0: {} round trip(s) in {:.3}s ({:.2}us each)",
            handled,
            elapsed,
            elapsed * 1e6 / handled.max(1) as f64
        );
    } else {
        loop {
            let mut ping = [0u8; 9];
            comm.recv_into(&mut ping, 0usize, PING)?;
            if ping[0] == 0 {
                break;
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&ping[1..]);
            let counter = u64::from_le_bytes(raw);
            comm.send(&(counter + 1).to_le_bytes(), 0, PONG)?;
            handled += 1;
        }
    }
    Ok(handled)
}
