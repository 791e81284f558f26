//! Serializes a small object many times in parallel, each write using a scratch buffer from the
//! selected pool, and verifies the size of every output.
//!
//! ```text
//! cargo run --example rp_write -- --strategy HYBRID_LOCK_FREE --tasks 100 --lightweight
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use argh::FromArgs;
use recycle_pool::{PoolBuilder, PoolStrategy, RecyclerPool, SelectedPool};
use serde::Serialize;
use tracing::info;

const EXPECTED_SIZE: usize = 49;

/// Parallel serialization driver for the recycling pools.
#[derive(FromArgs)]
struct Args {
    /// pool strategy (NO_OP, THREAD_LOCAL, QUEUE, STACK, STRIPED, HYBRID_QUEUE, HYBRID_STRIPED)
    #[argh(option, default = "PoolStrategy::HybridStriped")]
    strategy: PoolStrategy,

    /// number of parallel writes per round
    #[argh(option, default = "100")]
    tasks: usize,

    /// number of rounds
    #[argh(option, default = "1000")]
    rounds: usize,

    /// run the writes as async tasks instead of OS threads
    #[argh(switch)]
    lightweight: bool,

    /// requested number of stripes (default: hardware parallelism)
    #[argh(option)]
    stripes: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    first_name: &'static str,
    last_name: &'static str,
    age: u32,
}

const PERSON: Person = Person {
    first_name: "Mario",
    last_name: "Fusco",
    age: 49,
};

/// The consuming encoder: one buffer acquired and released around each write.
fn write(pool: &SelectedPool) -> usize {
    let size = pool.with_pooled(|buffer| {
        serde_json::to_writer(&mut *buffer, &PERSON).expect("writing to memory cannot fail");
        buffer.len()
    });

    assert_eq!(size, EXPECTED_SIZE, "unexpected output size");
    size
}

fn run_os_threads(pool: &Arc<SelectedPool>, tasks: usize) -> usize {
    let handles = (0..tasks)
        .map(|_| {
            let pool = Arc::clone(pool);
            thread::spawn(move || write(&pool))
        })
        .collect::<Vec<_>>();

    handles
        .into_iter()
        .map(|h| h.join().expect("writer thread panicked"))
        .sum()
}

async fn run_tasks(pool: &Arc<SelectedPool>, tasks: usize) -> usize {
    let handles = (0..tasks)
        .map(|_| {
            let pool = Arc::clone(pool);
            tokio::spawn(async move { write(&pool) })
        })
        .collect::<Vec<_>>();

    let mut sizes = Vec::with_capacity(handles.len());
    for handle in handles {
        sizes.push(handle.await.expect("writer task panicked"));
    }
    sizes.into_iter().sum()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Args = argh::from_env();

    let mut builder = PoolBuilder::new().strategy(args.strategy);
    if let Some(stripes) = args.stripes {
        builder = builder.stripe_count(stripes);
    }

    let pool = match builder.build() {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .build()
        .expect("failed to create Tokio runtime");

    let start = Instant::now();

    let bytes: usize = (0..args.rounds)
        .map(|_| {
            if args.lightweight {
                runtime.block_on(run_tasks(&pool, args.tasks))
            } else {
                run_os_threads(&pool, args.tasks)
            }
        })
        .sum();

    let elapsed = start.elapsed();

    info!(
        strategy = %args.strategy,
        lightweight = args.lightweight,
        bytes,
        ?elapsed,
        "all writes completed"
    );

    println!("{}", nm::Report::collect());

    ExitCode::SUCCESS
}
