// Root broadcasts SHA-256 digests; every rank recomputes them and the
// matches are summed with a reduce.
use sha2::{Digest, Sha256};
use shmem_mpi::{Communicator, Datatype, Op, World};
use std::env;

fn main() -> shmem_mpi::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages> [ranks]", args[0]);
        std::process::exit(1);
    }
    let num_messages: usize = args[1].parse().expect("Invalid number of messages");

    let mut builder = World::builder();
    if let Some(ranks) = args.get(2) {
        builder = builder.with_ranks(ranks.parse().expect("Invalid rank count"));
    }
    let world = builder.build()?;
    println!("broadcast_digest: {} rank(s), {} message(s)", world.size(), num_messages);

    let start = std::time::Instant::now();
    let results = world.launch(|comm| verify(comm, num_messages))?;
    let elapsed = start.elapsed();

    match results.into_iter().next() {
        Some(Ok(total)) => println!(
            "Verified {} of {} digest(s) across all ranks in {:.2?}",
            total,
            num_messages * world.size(),
            elapsed
        ),
        Some(Err(e)) => eprintln!("rank 0 failed: {}", e),
        None => {}
    }
    Ok(())
}

fn digest_of(i: usize) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(format!("message_{}", i).as_bytes());
    hasher.finalize().into()
}

fn verify(comm: &mut Communicator, num_messages: usize) -> shmem_mpi::Result<i32> {
    let mut matched = 0i32;
    for i in 0..num_messages {
        let mut digest = if comm.rank() == 0 { digest_of(i) } else { [0u8; 32] };
        comm.broadcast(&mut digest, 0)?;
        if digest == digest_of(i) {
            matched += 1;
        }
    }

    let total = comm.reduce(&matched.to_ne_bytes(), 1, Datatype::Int, Op::Sum, 0)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&total);
    Ok(i32::from_ne_bytes(raw))
}
