//! Cost of one acquire/release cycle for every pool strategy, single-threaded and with all
//! processors hammering the same pool.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use many_cpus::SystemHardware;
use new_zealand::nz;
use par_bench::{Run, ThreadPool};
use recycle_pool::{PoolBuilder, PoolStrategy, RecyclerPool, SelectedPool};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn build(strategy: PoolStrategy) -> SelectedPool {
    PoolBuilder::new()
        .strategy(strategy)
        .build()
        .expect("default stripe count is always valid")
}

fn cycle(pool: &SelectedPool) {
    let pooled = black_box(pool.acquire());
    pool.release(pooled);
}

fn entrypoint(c: &mut Criterion) {
    let processors = SystemHardware::current().processors();

    let mut one_thread = processors.to_builder().take(nz!(1)).map(|x| ThreadPool::new(&x));
    let mut all_threads = ThreadPool::new(&processors);

    if let Some(ref mut one_thread) = one_thread {
        let mut group = c.benchmark_group("rp_single_thread");

        for strategy in PoolStrategy::ALL {
            let pool = build(*strategy);

            Run::new()
                .iter(|_| cycle(&pool))
                .execute_criterion_on(one_thread, &mut group, &strategy.to_string());
        }

        group.finish();
    }

    let mut group = c.benchmark_group("rp_all_threads");

    for strategy in PoolStrategy::ALL {
        let pool = build(*strategy);

        Run::new()
            .iter(|_| cycle(&pool))
            .execute_criterion_on(&mut all_threads, &mut group, &strategy.to_string());
    }

    group.finish();
}
